//! End-to-end API tests through the router, without a socket

use std::sync::Arc;

use clap::Parser;
use ed25519_dalek::{Signer, SigningKey};
use hyper::{Method, StatusCode};
use rand::rngs::OsRng;
use serde_json::{json, Value};

use seatrace::chain::LocalChain;
use seatrace::config::Args;
use seatrace::db::Database;
use seatrace::routes::{dispatch, ApiRequest};
use seatrace::AppState;
use seatrace_registry::{Address, StageUpdatePolicy};

struct Wallet {
    key: SigningKey,
    address: Address,
}

impl Wallet {
    fn generate() -> Self {
        let key = SigningKey::generate(&mut OsRng);
        let address = Address::from_key_bytes(&key.verifying_key().to_bytes());
        Self { key, address }
    }

    fn sign(&self, message: &str) -> String {
        hex::encode(self.key.sign(message.as_bytes()).to_bytes())
    }
}

struct TestApp {
    state: AppState,
    admin: Wallet,
}

impl TestApp {
    fn new() -> Self {
        let admin = Wallet::generate();
        let args = Args::parse_from(["seatrace", "--dev-mode", "--database-path", ":memory:"]);
        let db = Arc::new(Database::open_in_memory().unwrap());
        let chain = Arc::new(
            LocalChain::open(Arc::clone(&db), Some(&admin.address), StageUpdatePolicy::AnyRoleHolder).unwrap(),
        );
        let state = AppState::new(args, db, chain).unwrap();
        Self { state, admin }
    }

    async fn send(&self, req: ApiRequest) -> (StatusCode, Value) {
        let resp = dispatch(&self.state, req).await;
        (resp.status, resp.body.unwrap_or(Value::Null))
    }

    async fn sign_in(&self, wallet: &Wallet) -> String {
        let (status, challenge) = self
            .send(ApiRequest::new(Method::POST, "/auth/challenge").with_json(&json!({
                "address": wallet.address.as_str(),
            })))
            .await;
        assert_eq!(status, StatusCode::OK);
        let message = challenge["message"].as_str().unwrap();
        assert!(message.contains(wallet.address.as_str()));

        let (status, auth) = self
            .send(ApiRequest::new(Method::POST, "/auth/verify").with_json(&json!({
                "address": wallet.address.as_str(),
                "signature": wallet.sign(message),
            })))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", auth);
        auth["token"].as_str().unwrap().to_string()
    }

    /// Sign in `wallet`, apply for `role`, and have the admin approve it
    async fn onboard(&self, wallet: &Wallet, role: &str) -> String {
        let token = self.sign_in(wallet).await;
        let admin_token = self.sign_in(&self.admin).await;

        let (status, application) = self
            .send(
                ApiRequest::new(Method::POST, "/applications")
                    .with_bearer(&token)
                    .with_json(&json!({ "role": role, "organization": "North Sea Co-op" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", application);
        let id = application["id"].as_str().unwrap();

        let (status, reviewed) = self
            .send(
                ApiRequest::new(Method::POST, &format!("/applications/{}/approve", id))
                    .with_bearer(&admin_token),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", reviewed);
        assert_eq!(reviewed["application"]["status"], "approved");
        token
    }
}

fn product_body(id: &str) -> Value {
    json!({
        "productId": id,
        "species": "Gadus morhua",
        "sourceType": "wild_caught",
        "originLocation": "North Sea, ICES IVb",
        "vesselOrFarm": "FV Northern Star",
        "quantity": 420.5,
        "unit": "kg",
        "initialStage": "caught",
        "location": "Peterhead"
    })
}

#[tokio::test]
async fn test_public_endpoints_and_routing() {
    let app = TestApp::new();

    let (status, health) = app.send(ApiRequest::new(Method::GET, "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["healthy"], true);
    assert_eq!(health["mode"], "development");

    let (status, version) = app.send(ApiRequest::new(Method::GET, "/version")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(version["version"].is_string());

    let (status, stats) = app.send(ApiRequest::new(Method::GET, "/chain/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["owner"], app.admin.address.as_str());

    let (status, body) = app.send(ApiRequest::new(Method::GET, "/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = app.send(ApiRequest::new(Method::DELETE, "/products")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = app.send(ApiRequest::new(Method::OPTIONS, "/products")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_sign_in_rejects_bad_signatures_and_reused_challenges() {
    let app = TestApp::new();
    let wallet = Wallet::generate();

    // No challenge issued yet
    let (status, _) = app
        .send(ApiRequest::new(Method::POST, "/auth/verify").with_json(&json!({
            "address": wallet.address.as_str(),
            "signature": wallet.sign("anything"),
        })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, challenge) = app
        .send(ApiRequest::new(Method::POST, "/auth/challenge").with_json(&json!({
            "address": wallet.address.as_str(),
        })))
        .await;
    let message = challenge["message"].as_str().unwrap().to_string();

    // Signed by someone else
    let impostor = Wallet::generate();
    let (status, _) = app
        .send(ApiRequest::new(Method::POST, "/auth/verify").with_json(&json!({
            "address": wallet.address.as_str(),
            "signature": impostor.sign(&message),
        })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The failed attempt consumed the challenge
    let (status, _) = app
        .send(ApiRequest::new(Method::POST, "/auth/verify").with_json(&json!({
            "address": wallet.address.as_str(),
            "signature": wallet.sign(&message),
        })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(ApiRequest::new(Method::POST, "/auth/challenge").with_json(&json!({ "address": "nope" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_profile_and_logout() {
    let app = TestApp::new();
    let wallet = Wallet::generate();
    let token = app.sign_in(&wallet).await;

    let (status, me) = app.send(ApiRequest::new(Method::GET, "/auth/me").with_bearer(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["address"], wallet.address.as_str());
    assert_eq!(me["roles"], json!([]));

    let (status, profile) = app
        .send(
            ApiRequest::new(Method::PUT, "/users/me")
                .with_bearer(&token)
                .with_json(&json!({ "displayName": "Ines", "email": "ines@example.org" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["user"]["displayName"], "Ines");

    let (status, public) = app
        .send(ApiRequest::new(Method::GET, &format!("/users/{}", wallet.address)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(public["profile"]["displayName"], "Ines");
    assert!(public["profile"].get("email").is_none());

    let (status, refreshed) = app
        .send(ApiRequest::new(Method::POST, "/auth/refresh").with_bearer(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let second = refreshed["token"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(ApiRequest::new(Method::POST, "/auth/logout").with_bearer(&second))
        .await;
    assert_eq!(status, StatusCode::OK);

    for t in [&token, &second] {
        let (status, _) = app.send(ApiRequest::new(Method::GET, "/auth/me").with_bearer(t)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = app.send(ApiRequest::new(Method::GET, "/users/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_product_lifecycle_and_trace() {
    let app = TestApp::new();
    let fisher = Wallet::generate();
    let processor = Wallet::generate();
    let bystander = Wallet::generate();

    let fisher_token = app.onboard(&fisher, "fisher").await;

    let (status, _) = app
        .send(ApiRequest::new(Method::POST, "/products").with_json(&product_body("LOT-1")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = app
        .send(
            ApiRequest::new(Method::POST, "/products")
                .with_bearer(&fisher_token)
                .with_json(&product_body("LOT-1")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["record"]["currentStage"], "caught");
    assert!(created["record"]["dataHash"].as_str().unwrap().starts_with("bafkrei"));

    let (status, duplicate) = app
        .send(
            ApiRequest::new(Method::POST, "/products")
                .with_bearer(&fisher_token)
                .with_json(&product_body("LOT-1")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(duplicate["code"], "DUPLICATE_ID");

    // Signed in, but no supply-chain role
    let bystander_token = app.sign_in(&bystander).await;
    let (status, _) = app
        .send(
            ApiRequest::new(Method::POST, "/products/LOT-1/stage")
                .with_bearer(&bystander_token)
                .with_json(&json!({ "stage": "processed" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Admin grants the processor role directly
    let admin_token = app.sign_in(&app.admin).await;
    let (status, granted) = app
        .send(
            ApiRequest::new(Method::POST, "/roles/grant")
                .with_bearer(&admin_token)
                .with_json(&json!({ "address": processor.address.as_str(), "role": "processor" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", granted);
    assert_eq!(granted["changed"], true);

    let processor_token = app.sign_in(&processor).await;
    let (status, updated) = app
        .send(
            ApiRequest::new(Method::POST, "/products/LOT-1/stage")
                .with_bearer(&processor_token)
                .with_json(&json!({ "stage": "processed", "location": "Aberdeen", "notes": "filleted" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["record"]["currentStage"], "processed");

    let (status, journey) = app.send(ApiRequest::new(Method::GET, "/products/LOT-1/journey")).await;
    assert_eq!(status, StatusCode::OK);
    let events = journey["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["stage"], "caught");
    assert_eq!(events[1]["stage"], "processed");

    let (status, trace) = app.send(ApiRequest::new(Method::GET, "/trace/LOT-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trace["verified"], true, "{}", trace);
    assert_eq!(trace["product"]["species"], "Gadus morhua");

    let (status, listed) = app
        .send(ApiRequest::new(Method::GET, "/products?stage=processed"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let tx = updated["receipt"]["txHash"].as_str().unwrap();
    let (status, receipt) = app.send(ApiRequest::new(Method::GET, &format!("/chain/tx/{}", tx))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["blockNumber"], updated["receipt"]["blockNumber"]);

    let (status, _) = app.send(ApiRequest::new(Method::GET, "/trace/LOT-404")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conservation_sample_verification() {
    let app = TestApp::new();
    let researcher = Wallet::generate();
    let researcher_token = app.onboard(&researcher, "researcher").await;

    let (status, created) = app
        .send(
            ApiRequest::new(Method::POST, "/conservation")
                .with_bearer(&researcher_token)
                .with_json(&json!({
                    "samplingId": "SAMPLE-001",
                    "species": "Thunnus thynnus",
                    "location": "Bay of Biscay",
                    "sampleType": "tissue",
                    "measurements": { "lengthCm": 182, "weightKg": 96.4 }
                })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["record"]["verified"], false);

    // Only admins verify
    let (status, _) = app
        .send(ApiRequest::new(Method::POST, "/conservation/SAMPLE-001/verify").with_bearer(&researcher_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = app.sign_in(&app.admin).await;
    let (status, verified) = app
        .send(ApiRequest::new(Method::POST, "/conservation/SAMPLE-001/verify").with_bearer(&admin_token))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", verified);
    assert_eq!(verified["record"]["verified"], true);

    let (status, again) = app
        .send(ApiRequest::new(Method::POST, "/conservation/SAMPLE-001/verify").with_bearer(&admin_token))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["code"], "ALREADY_VERIFIED");

    let (status, view) = app.send(ApiRequest::new(Method::GET, "/conservation/SAMPLE-001")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["integrity"]["hashMatches"], true);
    assert_eq!(view["integrity"]["documentMatches"], true);

    let (status, roles) = app
        .send(ApiRequest::new(Method::GET, &format!("/roles/{}", researcher.address)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roles["roles"], json!(["researcher"]));
    assert_eq!(roles["isOwner"], false);
}

#[tokio::test]
async fn test_applications_are_scoped_and_admin_only_review() {
    let app = TestApp::new();
    let alice = Wallet::generate();
    let bob = Wallet::generate();
    let alice_token = app.sign_in(&alice).await;
    let bob_token = app.sign_in(&bob).await;

    let (status, application) = app
        .send(
            ApiRequest::new(Method::POST, "/applications")
                .with_bearer(&alice_token)
                .with_json(&json!({ "role": "retailer" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = application["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            ApiRequest::new(Method::POST, "/applications")
                .with_bearer(&alice_token)
                .with_json(&json!({ "role": "retailer" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .send(
            ApiRequest::new(Method::POST, "/applications")
                .with_bearer(&alice_token)
                .with_json(&json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, bobs_view) = app
        .send(ApiRequest::new(Method::GET, "/applications").with_bearer(&bob_token))
        .await;
    assert_eq!(bobs_view.as_array().unwrap().len(), 0);

    let (status, _) = app
        .send(ApiRequest::new(Method::POST, &format!("/applications/{}/reject", id)).with_bearer(&bob_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin_token = app.sign_in(&app.admin).await;
    let (_, admin_view) = app
        .send(ApiRequest::new(Method::GET, "/applications?status=pending").with_bearer(&admin_token))
        .await;
    assert_eq!(admin_view.as_array().unwrap().len(), 1);

    let (status, rejected) = app
        .send(
            ApiRequest::new(Method::POST, &format!("/applications/{}/reject", id))
                .with_bearer(&admin_token)
                .with_json(&json!({ "note": "no retail licence on file" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["application"]["status"], "rejected");

    let (status, _) = app
        .send(ApiRequest::new(Method::POST, &format!("/applications/{}/approve", id)).with_bearer(&admin_token))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
