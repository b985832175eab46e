//! Integration tests for the calendar operations against a mocked
//! Google Calendar and token endpoint

mod test_utils;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::Matcher;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    use concierge::calendar::CalendarService;
    use concierge::calendar::public::{
        CreateEventRequest, ErrorKind, ListEventsRequest, ToolResult,
    };
    use concierge::google::CredentialStore;

    use crate::test_utils::{
        expired_credential, silent_server, store_credential, test_config, valid_credential,
        write_client_secrets,
    };

    fn lunch(start_time: &str, end_time: &str) -> CreateEventRequest {
        CreateEventRequest {
            summary: "Lunch".to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            description: "Catch up".to_string(),
            location: "Cafe".to_string(),
            attendees: vec!["ana@example.com".to_string()],
        }
    }

    fn january(max_results: u32) -> ListEventsRequest {
        ListEventsRequest {
            time_min: "2025-01-01T00:00:00-05:00".to_string(),
            time_max: "2025-01-02T00:00:00-05:00".to_string(),
            max_results,
        }
    }

    fn to_value<T: serde::Serialize>(result: &ToolResult<T>) -> Value {
        serde_json::from_str(&result.to_json()).unwrap()
    }

    /// Creates an event with times normalized to the default offset
    #[tokio::test]
    async fn it_creates_an_event() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());
        store_credential(&config, &valid_credential(&format!("{}/token", server.url())));

        let mock = server
            .mock("POST", "/calendars/primary/events")
            .match_header("authorization", "Bearer access-token")
            .match_body(Matcher::Json(json!({
                "summary": "Lunch",
                "description": "Catch up",
                "location": "Cafe",
                "start": {"dateTime": "2025-01-01T12:00:00-05:00"},
                "end": {"dateTime": "2025-01-01T13:00:00+00:00"},
                "attendees": [{"email": "ana@example.com"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "evt_1", "htmlLink": "https://calendar.google.com/event?eid=evt_1"}"#)
            .create_async()
            .await;

        let service = CalendarService::new(&config).unwrap();
        let result = service
            .create_event(lunch("2025-01-01T12:00:00", "2025-01-01T13:00:00Z"))
            .await;

        mock.assert_async().await;
        assert_eq!(
            to_value(&result),
            json!({
                "status": "success",
                "event_id": "evt_1",
                "htmlLink": "https://calendar.google.com/event?eid=evt_1"
            })
        );
    }

    /// Rejects an unparsable start time without calling the API
    #[tokio::test]
    async fn it_rejects_bad_datetimes_before_calling_the_api() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());
        store_credential(&config, &valid_credential(&format!("{}/token", server.url())));

        let mock = server
            .mock("POST", "/calendars/primary/events")
            .expect(0)
            .create_async()
            .await;

        let service = CalendarService::new(&config).unwrap();
        let result = service
            .create_event(lunch("not-a-date", "2025-01-01T13:00:00"))
            .await;

        mock.assert_async().await;
        match result {
            ToolResult::Error(err) => {
                assert_eq!(err.kind, ErrorKind::InvalidDateTimeFormat);
                assert_eq!(err.fields, vec!["start_time"]);
            }
            other => panic!("Expected an error, got {:?}", other),
        }
    }

    /// Reports every bad field at once
    #[tokio::test]
    async fn it_reports_both_bad_list_bounds() {
        let server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());
        store_credential(&config, &valid_credential(&format!("{}/token", server.url())));

        let service = CalendarService::new(&config).unwrap();
        let result = service
            .list_events(ListEventsRequest {
                time_min: "".to_string(),
                time_max: "whenever".to_string(),
                max_results: 10,
            })
            .await;

        let actual = to_value(&result);
        assert_eq!(actual["kind"], "invalid_date_time_format");
        assert_eq!(actual["fields"], json!(["time_min", "time_max"]));
    }

    /// Keeps the provider's status code and reason
    #[tokio::test]
    async fn it_surfaces_remote_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());
        store_credential(&config, &valid_credential(&format!("{}/token", server.url())));

        let _mock = server
            .mock("POST", "/calendars/primary/events")
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"code": 403, "message": "Calendar usage limits exceeded."}}"#)
            .create_async()
            .await;

        let service = CalendarService::new(&config).unwrap();
        let result = service
            .create_event(lunch("2025-01-01T12:00:00", "2025-01-01T13:00:00"))
            .await;

        assert_eq!(
            to_value(&result),
            json!({
                "status": "error",
                "kind": "remote_api_error",
                "message": "API error: 403 Calendar usage limits exceeded.",
                "status_code": 403
            })
        );
    }

    /// Passes the requested page size through to the API and returns
    /// the events it sends back
    #[tokio::test]
    async fn it_lists_events_with_max_results() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());
        store_credential(&config, &valid_credential(&format!("{}/token", server.url())));

        let mock = server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("timeMin".into(), "2025-01-01T00:00:00-05:00".into()),
                Matcher::UrlEncoded("timeMax".into(), "2025-01-02T00:00:00-05:00".into()),
                Matcher::UrlEncoded("maxResults".into(), "5".into()),
                Matcher::UrlEncoded("singleEvents".into(), "true".into()),
                Matcher::UrlEncoded("orderBy".into(), "startTime".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"items": [
                    {"id": "1", "summary": "Standup", "start": {"dateTime": "2025-01-01T09:00:00-05:00"}, "end": {"dateTime": "2025-01-01T09:15:00-05:00"}, "location": "Zoom"},
                    {"id": "2", "summary": "Review", "description": "Q1 plan", "start": {"dateTime": "2025-01-01T11:00:00-05:00"}, "end": {"dateTime": "2025-01-01T12:00:00-05:00"}},
                    {"id": "3", "start": {"dateTime": "2025-01-01T13:00:00-05:00"}, "end": {"dateTime": "2025-01-01T14:00:00-05:00"}},
                    {"id": "4", "summary": "Gym", "start": {"dateTime": "2025-01-01T18:00:00-05:00"}, "end": {"dateTime": "2025-01-01T19:00:00-05:00"}},
                    {"id": "5", "summary": "Dinner", "start": {"dateTime": "2025-01-01T20:00:00-05:00"}, "end": {"dateTime": "2025-01-01T21:00:00-05:00"}},
                    {"id": "6", "summary": "Call home", "start": {"dateTime": "2025-01-01T21:30:00-05:00"}, "end": {"dateTime": "2025-01-01T22:00:00-05:00"}},
                    {"id": "7", "summary": "Read", "start": {"dateTime": "2025-01-01T22:30:00-05:00"}, "end": {"dateTime": "2025-01-01T23:00:00-05:00"}}
                ]}"#,
            )
            .create_async()
            .await;

        let service = CalendarService::new(&config).unwrap();
        let result = service.list_events(january(5)).await;

        mock.assert_async().await;
        let actual = to_value(&result);
        assert_eq!(actual["status"], "success");
        // The cap is applied by the API, whatever it sends back is returned
        let events = actual["events"].as_array().unwrap();
        assert_eq!(events.len(), 7);
        assert_eq!(
            events[0],
            json!({
                "summary": "Standup",
                "start": "2025-01-01T09:00:00-05:00",
                "end": "2025-01-01T09:15:00-05:00",
                "description": "",
                "location": "Zoom"
            })
        );
        assert_eq!(events[2]["summary"], "");
        assert_eq!(events[6]["summary"], "Read");
    }

    /// All-day events report their date instead of a timestamp
    #[tokio::test]
    async fn it_lists_all_day_events_by_date() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());
        store_credential(&config, &valid_credential(&format!("{}/token", server.url())));

        let _mock = server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items": [{"id": "h", "summary": "New Year", "start": {"date": "2025-01-01"}, "end": {"date": "2025-01-02"}}]}"#)
            .create_async()
            .await;

        let service = CalendarService::new(&config).unwrap();
        let actual = to_value(&service.list_events(january(10)).await);

        assert_eq!(actual["events"][0]["start"], "2025-01-01");
        assert_eq!(actual["events"][0]["end"], "2025-01-02");
    }

    /// No stored credential and no client secrets means no network
    /// calls at all
    #[tokio::test]
    async fn it_requires_client_secrets_without_calling_out() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());

        let calendar = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let token = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let service = CalendarService::new(&config).unwrap();
        let actual = to_value(&service.list_events(january(10)).await);

        calendar.assert_async().await;
        token.assert_async().await;
        assert_eq!(actual["status"], "error");
        assert_eq!(actual["kind"], "missing_client_secrets");
    }

    /// With client secrets but no credential the caller must sign in
    /// first, operations never start the browser flow
    #[tokio::test]
    async fn it_requires_authentication() {
        let server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());
        write_client_secrets(&config);

        let service = CalendarService::new(&config).unwrap();
        let actual = to_value(
            &service
                .create_event(lunch("2025-01-01T12:00:00", "2025-01-01T13:00:00"))
                .await,
        );

        assert_eq!(actual["kind"], "auth_required");
        assert_eq!(actual["message"], "Authentication required.");
    }

    /// Refreshes an expired token, persists it and uses it
    #[tokio::test]
    async fn it_refreshes_an_expired_credential() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());
        store_credential(&config, &expired_credential(&format!("{}/token", server.url())));

        let token = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "refresh-token".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "fresh-token", "expires_in": 3599, "token_type": "Bearer"}"#)
            .create_async()
            .await;
        let calendar = server
            .mock("GET", "/calendars/primary/events")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer fresh-token")
            .with_status(200)
            .with_body(r#"{"items": []}"#)
            .create_async()
            .await;

        let service = CalendarService::new(&config).unwrap();
        let actual = to_value(&service.list_events(january(10)).await);

        token.assert_async().await;
        calendar.assert_async().await;
        assert_eq!(actual, json!({"status": "success", "events": []}));

        let stored = CredentialStore::new(&config.credentials_path).load().unwrap();
        assert_eq!(stored.access_token, "fresh-token");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-token"));
        assert!(stored.is_valid());
    }

    /// A rejected refresh clears the store so the next call starts over
    #[tokio::test]
    async fn it_clears_the_store_when_refresh_fails() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());
        write_client_secrets(&config);
        store_credential(&config, &expired_credential(&format!("{}/token", server.url())));

        let _token = server
            .mock("POST", "/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#)
            .create_async()
            .await;
        let calendar = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let service = CalendarService::new(&config).unwrap();
        let actual = to_value(&service.list_events(january(10)).await);

        calendar.assert_async().await;
        assert_eq!(actual["kind"], "auth_required");
        assert!(!config.credentials_path.exists());
    }

    /// A calendar API that never answers is reported as a timeout
    #[tokio::test]
    async fn it_reports_timeouts() {
        let url = silent_server().await;
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir, &url);
        config.http_timeout = Duration::from_millis(200);
        store_credential(&config, &valid_credential(&format!("{}/token", url)));

        let service = CalendarService::new(&config).unwrap();
        let actual = to_value(&service.list_events(january(10)).await);

        assert_eq!(actual["status"], "error");
        assert_eq!(actual["kind"], "timeout");
    }

    /// Garbage from the API is not echoed back to the caller
    #[tokio::test]
    async fn it_hides_unexpected_responses() {
        let mut server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &server.url());
        store_credential(&config, &valid_credential(&format!("{}/token", server.url())));

        let _mock = server
            .mock("POST", "/calendars/primary/events")
            .with_status(200)
            .with_body("<html>definitely not json</html>")
            .create_async()
            .await;

        let service = CalendarService::new(&config).unwrap();
        let actual = to_value(
            &service
                .create_event(lunch("2025-01-01T12:00:00", "2025-01-01T13:00:00"))
                .await,
        );

        assert_eq!(
            actual,
            json!({
                "status": "error",
                "kind": "unexpected_server_error",
                "message": "Unexpected server error."
            })
        );
    }
}
