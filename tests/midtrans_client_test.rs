use assert_matches::assert_matches;
use cafe_api::gateway::{
    CustomerDetails, GatewayError, ItemDetail, MidtransSnapClient, PaymentGateway,
    SnapTransactionRequest, TransactionDetails,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVER_KEY: &str = "SB-Mid-server-wiremock";
// base64("SB-Mid-server-wiremock:")
const BASIC_AUTH: &str = "Basic U0ItTWlkLXNlcnZlci13aXJlbW9jazo=";

fn snap_request() -> SnapTransactionRequest {
    SnapTransactionRequest {
        transaction_details: TransactionDetails {
            order_id: "MC-250115-007-1736912345".into(),
            gross_amount: 55000,
        },
        customer_details: Some(CustomerDetails {
            first_name: "Budi".into(),
            email: Some("budi@example.com".into()),
            phone: None,
        }),
        item_details: vec![
            ItemDetail {
                id: "espresso".into(),
                price: 50000,
                quantity: 1,
                name: "Espresso".into(),
            },
            ItemDetail {
                id: "TAX".into(),
                price: 5000,
                quantity: 1,
                name: "Tax".into(),
            },
        ],
    }
}

#[tokio::test]
async fn creates_transaction_with_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/snap/v1/transactions"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_partial_json(json!({
            "transaction_details": {
                "order_id": "MC-250115-007-1736912345",
                "gross_amount": 55000
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": "66e4fa55-fdac-4ef9-91b5-733b97d1b862",
            "redirect_url": "https://app.sandbox.midtrans.com/snap/v4/redirection/66e4fa55"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = MidtransSnapClient::with_base_url(SERVER_KEY, server.uri()).unwrap();
    let token = client.create_transaction(&snap_request()).await.unwrap();

    assert_eq!(token.token, "66e4fa55-fdac-4ef9-91b5-733b97d1b862");
    assert!(token.redirect_url.ends_with("/66e4fa55"));
}

#[tokio::test]
async fn rejection_carries_gateway_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/snap/v1/transactions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_messages": [
                "transaction_details.gross_amount is not equal to the sum of item_details"
            ]
        })))
        .mount(&server)
        .await;

    let client = MidtransSnapClient::with_base_url(SERVER_KEY, server.uri()).unwrap();
    let err = client.create_transaction(&snap_request()).await.unwrap_err();

    assert_matches!(
        err,
        GatewayError::Rejected { status: 400, ref message } if message.contains("gross_amount")
    );
}

#[tokio::test]
async fn rejection_without_body_uses_status_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = MidtransSnapClient::with_base_url(SERVER_KEY, server.uri()).unwrap();
    let err = client.create_transaction(&snap_request()).await.unwrap_err();

    assert_matches!(err, GatewayError::Rejected { status: 401, ref message } if message == "Unauthorized");
}

#[tokio::test]
async fn unexpected_success_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = MidtransSnapClient::with_base_url(SERVER_KEY, format!("{}/", server.uri())).unwrap();
    let err = client.create_transaction(&snap_request()).await.unwrap_err();

    assert_matches!(err, GatewayError::Decode(_));
}

#[tokio::test]
async fn unreachable_gateway_is_a_transport_error() {
    let client = MidtransSnapClient::with_base_url(SERVER_KEY, "http://127.0.0.1:9").unwrap();
    let err = client.create_transaction(&snap_request()).await.unwrap_err();

    assert_matches!(err, GatewayError::Http(_));
}
