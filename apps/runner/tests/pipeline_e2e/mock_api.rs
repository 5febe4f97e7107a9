//! Mock KernelCI API for E2E tests.
//!
//! Starts an in-process HTTP server with the node and pub/sub endpoints
//! the runner uses and records what it receives.

use std::collections::{HashMap, VecDeque};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, get, post, put, web};
use serde_json::{Value, json};

/// A results submission received by the mock.
#[derive(Debug, Clone)]
pub struct Submission {
    pub node_id: String,
    pub authorization: Option<String>,
    pub body: Value,
}

/// Shared state for the mock API.
#[derive(Default)]
pub struct MockApiState {
    pub nodes: HashMap<String, Value>,
    pub created: Vec<Value>,
    pub submissions: Vec<Submission>,
    /// Answer node updates with 500
    pub fail_submissions: bool,
    /// Node payloads handed out by `listen`, oldest first
    pub events: VecDeque<Value>,
    pub subscriptions: Vec<String>,
    pub unsubscribed: Vec<String>,
    next_id: usize,
}

/// Timestamps are sent without an offset.
pub const API_TIMESTAMP: &str = "2024-02-02T11:43:15.473000";

type SharedState = web::Data<Arc<Mutex<MockApiState>>>;

#[get("/latest/node/{id}")]
async fn get_node(state: SharedState, id: web::Path<String>) -> HttpResponse {
    let state = state.lock().unwrap();
    match state.nodes.get(id.as_str()) {
        Some(node) => HttpResponse::Ok().json(node),
        None => HttpResponse::NotFound().json(json!({ "detail": "Node not found" })),
    }
}

#[post("/latest/node")]
async fn create_node(state: SharedState, body: web::Json<Value>) -> HttpResponse {
    let mut state = state.lock().unwrap();
    state.next_id += 1;
    let id = format!("child-{}", state.next_id);

    let mut node = body.into_inner();
    node["id"] = Value::String(id.clone());
    node["created"] = json!(API_TIMESTAMP);
    node["updated"] = json!(API_TIMESTAMP);
    state.created.push(node.clone());
    state.nodes.insert(id, node.clone());
    HttpResponse::Ok().json(node)
}

#[put("/latest/nodes/{id}")]
async fn submit_results(
    req: HttpRequest,
    state: SharedState,
    id: web::Path<String>,
    body: web::Json<Value>,
) -> HttpResponse {
    let mut state = state.lock().unwrap();
    if state.fail_submissions {
        return HttpResponse::InternalServerError()
            .json(json!({ "detail": "database unavailable" }));
    }
    if !state.nodes.contains_key(id.as_str()) {
        return HttpResponse::NotFound().json(json!({ "detail": "Node not found" }));
    }
    let authorization = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.submissions.push(Submission {
        node_id: id.into_inner(),
        authorization,
        body: body.into_inner(),
    });
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

#[post("/latest/subscribe/{channel}")]
async fn subscribe(state: SharedState, channel: web::Path<String>) -> HttpResponse {
    let mut state = state.lock().unwrap();
    state.subscriptions.push(channel.into_inner());
    let id = state.subscriptions.len();
    HttpResponse::Ok().json(json!({ "id": id, "channel": "node", "user": "admin" }))
}

#[get("/latest/listen/{id}")]
async fn listen(state: SharedState, _id: web::Path<String>) -> HttpResponse {
    let next = state.lock().unwrap().events.pop_front();
    let data = match next {
        Some(node) => node,
        None => {
            tokio::time::sleep(Duration::from_millis(20)).await;
            json!("BEEP")
        }
    };
    let cloud_event = json!({
        "specversion": "1.0",
        "type": "api.kernelci.org",
        "source": "https://api.kernelci.org/",
        "id": "1e5b2c7a",
        "data": data
    });
    HttpResponse::Ok().json(json!({
        "type": "message",
        "pattern": null,
        "channel": "node",
        "data": cloud_event.to_string()
    }))
}

#[post("/latest/unsubscribe/{id}")]
async fn unsubscribe(state: SharedState, id: web::Path<String>) -> HttpResponse {
    state.lock().unwrap().unsubscribed.push(id.into_inner());
    HttpResponse::Ok().finish()
}

/// Mock KernelCI API server.
pub struct MockKernelCi {
    pub url: String,
    pub state: Arc<Mutex<MockApiState>>,
}

impl MockKernelCi {
    /// Start the mock API on an ephemeral port with the given nodes.
    pub async fn start(nodes: Vec<Value>) -> Self {
        let mut initial = MockApiState::default();
        for node in nodes {
            let id = node["id"].as_str().expect("node without id").to_string();
            initial.nodes.insert(id, node);
        }
        let state = Arc::new(Mutex::new(initial));

        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{}", port);

        let state_data = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state_data.clone()))
                .service(get_node)
                .service(create_node)
                .service(submit_results)
                .service(subscribe)
                .service(listen)
                .service(unsubscribe)
        })
        .workers(1)
        .listen(listener)
        .expect("failed to listen")
        .disable_signals()
        .run();

        // Server lives for the process lifetime
        tokio::spawn(server);

        MockKernelCi { url, state }
    }

    pub fn created(&self) -> Vec<Value> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn fail_submissions(&self) {
        self.state.lock().unwrap().fail_submissions = true;
    }

    /// Queue a node event as the API publishes it (`op` plus node fields).
    pub fn publish(&self, op: &str, node: &Value) {
        let mut event = node.clone();
        event["op"] = json!(op);
        self.state.lock().unwrap().events.push_back(event);
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.state.lock().unwrap().unsubscribed.clone()
    }
}

/// A checkout node as the API returns it.
pub fn checkout_node(id: &str) -> Value {
    json!({
        "id": id,
        "kind": "checkout",
        "name": "checkout",
        "path": ["checkout"],
        "state": "available",
        "artifacts": { "tarball": "https://storage.example.org/linux-6.8.tar.gz" },
        "group": null,
        "parent": null,
        "result": null,
        "data": {
            "kernel_revision": {
                "tree": "mainline",
                "branch": "master",
                "commit": "e8f897f4afef0031fe618a8e94127a0934896aba"
            }
        },
        "created": API_TIMESTAMP,
        "updated": "2024-02-02T11:48:02.108000",
        "timeout": "2024-02-02T17:43:15.473000",
        "holdoff": null,
        "owner": "admin",
        "user_groups": []
    })
}

/// A checkout that has no artifacts yet.
pub fn bare_checkout_node(id: &str) -> Value {
    let mut node = checkout_node(id);
    node["artifacts"] = Value::Null;
    node
}
