use super::*;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode as AxumStatus},
    response::{IntoResponse, Response as AxumResponse},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;
use tokio::{net::TcpListener, sync::Mutex};

const TOKEN: &str = "test-token";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Text { name: String, value: String },
    File { name: String, filename: String, mime: String, bytes: Vec<u8> },
}

#[derive(Clone, Default)]
struct ServerState {
    orders: Arc<Mutex<Vec<UpdateOrderRequest>>>,
    fields: Arc<Mutex<Vec<Field>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    passwords: Arc<Mutex<Vec<ChangePasswordRequest>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        == Some(&format!("Bearer {TOKEN}"))
}

fn unauthorized() -> AxumResponse {
    (
        AxumStatus::UNAUTHORIZED,
        Json(json!({ "message": "token expired" })),
    )
        .into_response()
}

async fn collect_fields(mut multipart: Multipart) -> Vec<Field> {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("field") {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let mime = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.expect("bytes").to_vec();
                fields.push(Field::File {
                    name,
                    filename,
                    mime,
                    bytes,
                });
            }
            None => {
                let value = field.text().await.expect("text");
                fields.push(Field::Text { name, value });
            }
        }
    }
    fields
}

async fn handle_get_images(headers: HeaderMap) -> AxumResponse {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "images": [
            { "_id": "b", "title": "Bridge", "image": "https://cdn.test/b.jpg", "order": 1 },
            { "_id": "a", "title": "Alps", "image": "https://cdn.test/a.jpg", "order": 0 },
            { "_id": "n", "title": "New", "image": "https://cdn.test/n.jpg" }
        ]
    }))
    .into_response()
}

async fn handle_update_order(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateOrderRequest>,
) -> AxumResponse {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.orders.lock().await.push(payload);
    Json(json!({ "message": "Image order updated" })).into_response()
}

async fn handle_update_image(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AxumResponse {
    if !authorized(&headers) {
        return unauthorized();
    }
    let fields = collect_fields(multipart).await;
    let title = fields
        .iter()
        .find_map(|field| match field {
            Field::Text { name, value } if name == "title" => Some(value.clone()),
            _ => None,
        })
        .unwrap_or_default();
    let replaced = fields.iter().any(|field| matches!(field, Field::File { .. }));
    state.fields.lock().await.extend(fields);
    let image = if replaced {
        format!("https://cdn.test/{id}-v2.jpg")
    } else {
        format!("https://cdn.test/{id}.jpg")
    };
    Json(json!({ "image": { "_id": id, "title": title, "image": image, "order": 4 } }))
        .into_response()
}

async fn handle_delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> AxumResponse {
    if !authorized(&headers) {
        return unauthorized();
    }
    match id.as_str() {
        "boom" => (
            AxumStatus::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "database unavailable" })),
        )
            .into_response(),
        "inactive" => (
            AxumStatus::FORBIDDEN,
            Json(json!({ "code": "ACCOUNT_INACTIVE", "message": "Account inactive" })),
        )
            .into_response(),
        "unverified" => (
            AxumStatus::FORBIDDEN,
            Json(json!({ "code": "NOT_VERIFIED" })),
        )
            .into_response(),
        "missing" => AxumStatus::NOT_FOUND.into_response(),
        _ => {
            state.deleted.lock().await.push(id);
            AxumStatus::OK.into_response()
        }
    }
}

async fn handle_upload(
    State(state): State<ServerState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AxumResponse {
    if !authorized(&headers) {
        return unauthorized();
    }
    let fields = collect_fields(multipart).await;
    state.fields.lock().await.extend(fields);
    (AxumStatus::CREATED, Json(json!({ "message": "uploaded" }))).into_response()
}

async fn handle_login(Json(payload): Json<LoginRequest>) -> AxumResponse {
    if payload.email == "ada@example.com" && payload.password == "correct horse" {
        Json(json!({ "accessToken": TOKEN })).into_response()
    } else {
        (
            AxumStatus::BAD_REQUEST,
            Json(json!({ "message": "Invalid email or password" })),
        )
            .into_response()
    }
}

async fn handle_register(Json(payload): Json<RegisterRequest>) -> AxumResponse {
    if payload.username.is_empty() {
        return (AxumStatus::UNPROCESSABLE_ENTITY, Json(json!({ "message": "username required" })))
            .into_response();
    }
    Json(json!({ "accessToken": format!("{TOKEN}-{}", payload.username) })).into_response()
}

async fn handle_change_password(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> AxumResponse {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.passwords.lock().await.push(payload);
    AxumStatus::OK.into_response()
}

async fn spawn_gallery_server() -> (String, ServerState) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/getImages", get(handle_get_images))
        .route("/api/updateImageOrder", put(handle_update_order))
        .route("/api/updateImage/:id", put(handle_update_image))
        .route("/api/deleteImage/:id", delete(handle_delete))
        .route("/api/upload-images", post(handle_upload))
        .route("/api/login", post(handle_login))
        .route("/api/register", post(handle_register))
        .route("/api/changePassword", post(handle_change_password))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/api"), state)
}

fn credential() -> Credential {
    Credential::bearer(TOKEN)
}

#[test]
fn base_url_without_trailing_slash_keeps_its_path() {
    let gateway = HttpGateway::new("https://gallery.example/api/v1").expect("gateway");
    assert_eq!(
        gateway.endpoint("getImages").expect("endpoint").as_str(),
        "https://gallery.example/api/v1/getImages"
    );
    assert_eq!(
        gateway
            .image_endpoint("deleteImage", &"a b".into())
            .expect("endpoint")
            .as_str(),
        "https://gallery.example/api/v1/deleteImage/a%20b"
    );
}

#[test]
fn rejects_non_http_base_url() {
    assert!(matches!(
        HttpGateway::new("ftp://gallery.example"),
        Err(GalleryError::Validation(_))
    ));
    assert!(matches!(
        HttpGateway::new("not a url"),
        Err(GalleryError::Validation(_))
    ));
}

#[test]
fn status_codes_map_onto_error_kinds() {
    let classify = |status: u16, body: ApiError| classify_failure(&ApiException::new(status, body));

    assert!(classify(401, ApiError::default()).requires_reauth());
    assert!(classify(403, ApiError::new(Some(ErrorCode::AccountInactive), "inactive")).requires_reauth());
    assert_eq!(
        classify(403, ApiError {
            code: Some(ErrorCode::NotVerified),
            message: None
        }),
        GalleryError::Validation("account is not verified".into())
    );
    assert_eq!(
        classify(422, ApiError::new(None, "title too short")),
        GalleryError::Validation("title too short".into())
    );
    assert!(matches!(
        classify(503, ApiError::default()),
        GalleryError::Transport(message) if message.contains("503")
    ));
    assert!(matches!(classify(429, ApiError::default()), GalleryError::Transport(_)));
}

#[tokio::test]
async fn fetch_images_sends_bearer_and_parses_records() {
    let (server_url, _state) = spawn_gallery_server().await;
    let gateway = HttpGateway::new(&server_url).expect("gateway");

    let records = gateway.fetch_images(&credential()).await.expect("fetch");

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].id, ImageId::new("b"));
    assert_eq!(records[2].order, None);
}

#[tokio::test]
async fn rejected_token_is_unauthorized() {
    let (server_url, _state) = spawn_gallery_server().await;
    let gateway = HttpGateway::new(&server_url).expect("gateway");

    let err = gateway
        .fetch_images(&Credential::bearer("stale"))
        .await
        .expect_err("must fail");
    assert_eq!(err, GalleryError::Unauthorized("token expired".into()));
}

#[tokio::test]
async fn persist_order_sends_full_mapping() {
    let (server_url, state) = spawn_gallery_server().await;
    let gateway = HttpGateway::new(&server_url).expect("gateway");
    let entries = vec![
        OrderEntry {
            id: "b".into(),
            order: 0,
        },
        OrderEntry {
            id: "a".into(),
            order: 1,
        },
    ];

    gateway
        .persist_order(&credential(), &entries)
        .await
        .expect("persist");
    gateway
        .persist_order(&credential(), &entries)
        .await
        .expect("persist again");

    let orders = state.orders.lock().await;
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].images, entries);
    assert_eq!(orders[1].images, entries);
}

#[tokio::test]
async fn persist_edit_uploads_title_and_optional_file() {
    let (server_url, state) = spawn_gallery_server().await;
    let gateway = HttpGateway::new(&server_url).expect("gateway");

    let title_only = gateway
        .persist_edit(&credential(), &"a".into(), ImageEdit::title("Alps at dusk"))
        .await
        .expect("edit");
    assert_eq!(title_only.title, "Alps at dusk");
    assert_eq!(title_only.image_ref, "https://cdn.test/a.jpg");

    let replaced = gateway
        .persist_edit(
            &credential(),
            &"a".into(),
            ImageEdit::title("Alps").with_image(
                ImageFile::new("alps.png", vec![1, 2, 3]).with_mime_type("image/png"),
            ),
        )
        .await
        .expect("edit with file");
    assert_eq!(replaced.image_ref, "https://cdn.test/a-v2.jpg");

    let fields = state.fields.lock().await;
    assert!(fields.contains(&Field::File {
        name: "image".into(),
        filename: "alps.png".into(),
        mime: "image/png".into(),
        bytes: vec![1, 2, 3],
    }));
}

#[tokio::test]
async fn create_images_pairs_files_with_titles() {
    let (server_url, state) = spawn_gallery_server().await;
    let gateway = HttpGateway::new(&server_url).expect("gateway");
    let uploads = crate::gateway::prepare_uploads(vec![
        ImageUpload::new(ImageFile::new("one.jpg", vec![1]), "First"),
        ImageUpload::new(ImageFile::new("two.jpg", vec![2]), "  "),
    ])
    .expect("prepare");

    gateway
        .create_images(&credential(), uploads)
        .await
        .expect("upload");

    let fields = state.fields.lock().await;
    assert_eq!(
        *fields,
        vec![
            Field::File {
                name: "images".into(),
                filename: "one.jpg".into(),
                mime: "application/octet-stream".into(),
                bytes: vec![1],
            },
            Field::Text {
                name: "titles".into(),
                value: "First".into(),
            },
            Field::File {
                name: "images".into(),
                filename: "two.jpg".into(),
                mime: "application/octet-stream".into(),
                bytes: vec![2],
            },
            Field::Text {
                name: "titles".into(),
                value: "Image 2".into(),
            },
        ]
    );
}

#[tokio::test]
async fn delete_maps_server_failures() {
    let (server_url, state) = spawn_gallery_server().await;
    let gateway = HttpGateway::new(&server_url).expect("gateway");

    gateway
        .persist_delete(&credential(), &"a".into())
        .await
        .expect("delete");
    assert_eq!(*state.deleted.lock().await, vec!["a".to_string()]);

    let transport = gateway
        .persist_delete(&credential(), &"boom".into())
        .await
        .expect_err("500");
    assert!(transport.is_retryable());
    assert!(matches!(transport, GalleryError::Transport(_)));

    let inactive = gateway
        .persist_delete(&credential(), &"inactive".into())
        .await
        .expect_err("403");
    assert_eq!(inactive, GalleryError::Unauthorized("Account inactive".into()));

    let unverified = gateway
        .persist_delete(&credential(), &"unverified".into())
        .await
        .expect_err("403");
    assert!(matches!(unverified, GalleryError::Validation(_)));

    let missing = gateway
        .persist_delete(&credential(), &"missing".into())
        .await
        .expect_err("404");
    assert!(matches!(missing, GalleryError::Validation(_)));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let gateway = HttpGateway::new(&format!("http://{addr}")).expect("gateway");
    let err = gateway
        .fetch_images(&credential())
        .await
        .expect_err("connection refused");
    assert!(matches!(err, GalleryError::Transport(_)));
}

#[tokio::test]
async fn login_register_and_change_password() {
    let (server_url, state) = spawn_gallery_server().await;
    let gateway = HttpGateway::new(&server_url).expect("gateway");

    let credential = gateway
        .login("ada@example.com", "correct horse")
        .await
        .expect("login");
    assert_eq!(credential.token(), TOKEN);

    let rejected = gateway
        .login("ada@example.com", "wrong")
        .await
        .expect_err("bad password");
    assert_eq!(
        rejected,
        GalleryError::Validation("Invalid email or password".into())
    );

    let registered = gateway
        .register(RegisterRequest {
            username: "ada".into(),
            email: "ada@example.com".into(),
            phone: "5550100000".into(),
            password: "Str0ng!pass".into(),
        })
        .await
        .expect("register");
    assert_eq!(registered.token(), format!("{TOKEN}-ada"));

    gateway
        .change_password(&credential, "correct horse", "battery staple")
        .await
        .expect("change password");
    let passwords = state.passwords.lock().await;
    assert_eq!(passwords[0].old_password, "correct horse");
    assert_eq!(passwords[0].new_password, "battery staple");
}
