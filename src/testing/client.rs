use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use tower::ServiceExt;

/// In-process HTTP client driving a [`Router`] without a socket.
#[derive(Clone)]
pub struct TestClient {
    app: Router,
}

impl TestClient {
    pub fn new(app: Router) -> Self {
        Self { app }
    }

    pub fn get(&self, uri: &str) -> TestRequest {
        self.request(Method::GET, uri)
    }

    pub fn post(&self, uri: &str) -> TestRequest {
        self.request(Method::POST, uri)
    }

    pub fn put(&self, uri: &str) -> TestRequest {
        self.request(Method::PUT, uri)
    }

    pub fn delete(&self, uri: &str) -> TestRequest {
        self.request(Method::DELETE, uri)
    }

    pub fn request(&self, method: Method, uri: &str) -> TestRequest {
        TestRequest {
            app: self.app.clone(),
            method,
            uri: uri.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

#[must_use = "requests do nothing until sent"]
pub struct TestRequest {
    app: Router,
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
}

impl TestRequest {
    pub fn header(mut self, name: header::HeaderName, value: &str) -> Self {
        let value = HeaderValue::from_str(value).expect("valid header value");
        self.headers.insert(name, value);
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header(header::AUTHORIZATION, &format!("Bearer {token}"))
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = serde_json::to_vec(body).expect("serialize json body").into();
        self.header(header::CONTENT_TYPE, "application/json")
    }

    pub fn form<T: Serialize>(mut self, body: &T) -> Self {
        self.body = serde_urlencoded::to_string(body)
            .expect("serialize form body")
            .into();
        self.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
    }

    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(&self.uri);
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers);
        }
        let request = builder
            .body(Body::from(self.body))
            .expect("valid test request");

        let response = match self.app.oneshot(request).await {
            Ok(res) => res,
            Err(never) => match never {},
        };
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

#[derive(Debug)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body, panicking with the status and raw body on mismatch.
    pub fn json<T: DeserializeOwned>(&self) -> T {
        match serde_json::from_slice(&self.body) {
            Ok(v) => v,
            Err(e) => panic!(
                "response body is not the expected json ({e}); status {} body {:?}",
                self.status,
                self.text()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Form, Json};
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Echo {
        name: String,
    }

    fn echo_app() -> Router {
        Router::new()
            .route("/json", post(|Json(e): Json<Echo>| async move { Json(e) }))
            .route("/form", post(|Form(e): Form<Echo>| async move { Json(e) }))
            .route(
                "/auth",
                post(|headers: HeaderMap| async move {
                    headers
                        .get(header::AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string()
                }),
            )
    }

    #[tokio::test]
    async fn sends_json_and_form_bodies() {
        let client = TestClient::new(echo_app());
        let body = Echo { name: "ada".into() };

        let res = client.post("/json").json(&body).send().await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.json::<Echo>(), body);

        let res = client.post("/form").form(&body).send().await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.json::<Echo>(), body);
    }

    #[tokio::test]
    async fn bearer_sets_authorization_header() {
        let client = TestClient::new(echo_app());
        let res = client.post("/auth").bearer("abc").send().await;
        assert_eq!(res.text(), "Bearer abc");
    }
}
