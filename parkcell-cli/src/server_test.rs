#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    use parkcell_core::client::ParkingClient;

    use crate::catalog::Catalog;
    use crate::server::{create_client, router};

    const CATALOG: &str = r#"{
        "cell_types": [
            { "id": 1, "name": "PARTICULAR" },
            { "id": 2, "name": "MOTO" }
        ],
        "lots": [
            { "id": 1, "name": "Lot Norte", "capacity": 2, "owner_id": 7 }
        ],
        "customers": [
            { "id": 10, "document_type": "CC", "document_number": "1010", "email": "ana@example.com" },
            { "id": 11, "document_type": "CC", "document_number": "1011", "email": " ANA@example.com" }
        ],
        "vehicles": [
            { "plate": "AAA111", "vehicle_type_id": 1 }
        ]
    }"#;

    fn app() -> Router {
        let catalog: Catalog = serde_json::from_str(CATALOG).unwrap();
        let mut client = ParkingClient::new();
        let summary = catalog.apply(&mut client).unwrap();
        assert_eq!(summary.cells_created, 2);
        assert_eq!(summary.vehicles_registered, 1);
        router(Arc::new(Mutex::new(client)), 8)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["data"]["active_reservations"], 0);
    }

    #[tokio::test]
    async fn test_customer_reservation_lifecycle() {
        let app = app();

        let (status, body) = send(
            &app,
            "POST",
            "/customers/10/reservations",
            Some(json!({ "plate": "aaa111", "vehicle_type_id": 1, "lot_id": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "OPEN");
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let cell_id = body["data"]["cell_id"].as_str().unwrap().to_string();

        let (_, cell) = send(&app, "GET", &format!("/cells/{}", cell_id), None).await;
        assert_eq!(cell["data"]["status"], "OCCUPIED");

        let (_, active) = send(&app, "GET", "/reservations/active", None).await;
        assert_eq!(active["data"].as_array().unwrap().len(), 1);

        // Same email through the alias billing reference
        let (_, vehicles) = send(&app, "GET", "/customers/11/vehicles?email=ana@example.com", None).await;
        assert_eq!(vehicles["data"][0]["plate"], "AAA111");

        let (status, closed) = send(&app, "POST", &format!("/reservations/{}/close", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closed["data"]["status"], "CLOSED");

        let (status, again) = send(&app, "POST", &format!("/reservations/{}/close", id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(again["code"], "INVALID_STATE");
        assert_eq!(again["success"], false);

        let (_, cell) = send(&app, "GET", &format!("/cells/{}", cell_id), None).await;
        assert_eq!(cell["data"]["status"], "FREE");
    }

    #[tokio::test]
    async fn test_overlapping_email_is_rejected() {
        let app = app();
        let (status, _) = send(
            &app,
            "POST",
            "/customers/10/reservations",
            Some(json!({ "plate": "AAA111", "vehicle_type_id": 1, "lot_id": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            "POST",
            "/customers/11/reservations",
            Some(json!({ "plate": "ZZZ999", "vehicle_type_id": 1, "lot_id": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
        assert!(body["error"].as_str().unwrap().contains("Lot Norte"));
    }

    #[tokio::test]
    async fn test_error_codes() {
        let app = app();

        let (status, body) = send(&app, "GET", "/reservations/rsv_missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (_, cells) = send(&app, "GET", "/lots/1/cells", None).await;
        let cell_id = cells["data"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/cells/{}/status", cell_id),
            Some(json!({ "status": "BROKEN" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");

        let (status, body) = send(
            &app,
            "POST",
            "/reservations",
            Some(json!({
                "vehicle_id": 1,
                "cell_id": cell_id,
                "start": "2030-01-01T10:00:00Z",
                "end": "2030-01-01T09:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");

        let (status, body) = send(&app, "POST", "/lots/99/capacity", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[test]
    fn test_storage_that_cannot_be_opened_is_an_error() {
        assert!(create_client("memory").is_ok());

        let err = create_client("postgres://localhost").err().unwrap();
        assert_eq!(err.kind(), "CONFIGURATION_ERROR");

        let missing = std::env::temp_dir().join("parkcell-missing-dir").join("nested").join("state.db");
        let storage = format!("sqlite:{}", missing.display());
        assert!(create_client(&storage).is_err());
    }

    #[tokio::test]
    async fn test_operator_status_override_and_availability() {
        let app = app();
        let (_, cells) = send(&app, "GET", "/lots/1/cells", None).await;
        let cell_id = cells["data"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "PATCH",
            &format!("/cells/{}/status", cell_id),
            Some(json!({ "status": "occupied" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "OCCUPIED");

        let (_, availability) = send(&app, "GET", "/lots/availability", None).await;
        assert_eq!(availability["data"][0]["name"], "Lot Norte");
        assert_eq!(availability["data"][0]["free_cells"], 1);

        let (status, report) = send(&app, "POST", "/reconcile", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["data"]["failures"], 0);
    }
}
