
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Serves `body` at `/audio/index.m3u8` and returns the playlist url.
pub async fn setup_mock_server(body: &str) -> (String, MockServer) {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/audio/index.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    (format!("{}/audio/index.m3u8", mock_server.uri()), mock_server)
}

pub trait HlsMock {
    async fn mock<B>(&self, mock_path: &str, body: B) -> &Self
    where
        B: Into<Vec<u8>>;

    /// Like [`HlsMock::mock`], but fails the test unless the path is
    /// requested exactly `times` times.
    async fn mock_expect<B>(&self, mock_path: &str, body: B, times: u64) -> &Self
    where
        B: Into<Vec<u8>>;

    async fn mock_status(&self, mock_path: &str, status: u16) -> &Self;
}

impl HlsMock for MockServer {
    async fn mock<B>(&self, mock_path: &str, body: B) -> &Self
    where
        B: Into<Vec<u8>>,
    {
        Mock::given(method("GET"))
            .and(path(mock_path))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(self)
            .await;
        self
    }

    async fn mock_expect<B>(&self, mock_path: &str, body: B, times: u64) -> &Self
    where
        B: Into<Vec<u8>>,
    {
        Mock::given(method("GET"))
            .and(path(mock_path))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .expect(times)
            .mount(self)
            .await;
        self
    }

    async fn mock_status(&self, mock_path: &str, status: u16) -> &Self {
        Mock::given(method("GET"))
            .and(path(mock_path))
            .respond_with(ResponseTemplate::new(status))
            .mount(self)
            .await;
        self
    }
}
