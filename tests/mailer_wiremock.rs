/// Resend transport tests against a mocked email API
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lead_capture_api::config::MailerSettings;
use lead_capture_api::mailer::{mailer_from_settings, Mailer, OutgoingEmail, ResendMailer};

fn email() -> OutgoingEmail {
    OutgoingEmail {
        to: "admin@agency.test".into(),
        from: "noreply@agency.test".into(),
        reply_to: "ana@example.com".into(),
        subject: "✨ New lead received: Ana Lee (L1)".into(),
        text: "A new lead was submitted.".into(),
        html: "<p>A new lead was submitted.</p>".into(),
    }
}

#[tokio::test]
async fn resend_posts_expected_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("Authorization", "Bearer re_test"))
        .and(body_partial_json(json!({
            "from": "noreply@agency.test",
            "to": ["admin@agency.test"],
            "reply_to": "ana@example.com",
            "subject": "✨ New lead received: Ana Lee (L1)"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email_1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mailer = ResendMailer::new(format!("{}/", mock_server.uri()), "re_test".into()).unwrap();
    mailer.send(&email()).await.unwrap();
}

#[tokio::test]
async fn resend_error_status_is_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid from address"))
        .mount(&mock_server)
        .await;

    let mailer = ResendMailer::new(mock_server.uri(), "re_test".into()).unwrap();
    let err = mailer.send(&email()).await.unwrap_err();

    assert!(err.to_string().contains("422"));
    assert!(err.to_string().contains("invalid from address"));
}

#[tokio::test]
async fn missing_api_key_falls_back_to_log_mailer() {
    let mailer = mailer_from_settings(&MailerSettings {
        resend_api_key: None,
        resend_base_url: "http://127.0.0.1:9".into(),
    })
    .unwrap();

    // Nothing listens on the base URL; only the logging transport can succeed.
    mailer.send(&email()).await.unwrap();
}
