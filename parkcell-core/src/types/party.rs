use serde::{Deserialize, Serialize};

use super::{CellTypeId, CustomerId, VehicleId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    /// Normalized licence plate
    pub plate: String,
    pub vehicle_type_id: CellTypeId,
}

/// Customer billing reference. Only the email takes part in matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: CustomerId,
    pub document_type: String,
    pub document_number: String,
    pub email: String,
}

/// Trimmed, lower-cased email used for every customer comparison
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trimmed, upper-cased plate used for lookup and registration
pub fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}
