pub use client::{Client, ClientError, HeaderMap, Headers, Method, Response, StatusCode};
pub use uri::{InvalidUriError, Uri};

mod uri {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub struct InvalidUriError(String);

    impl Display for InvalidUriError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl From<http::uri::InvalidUri> for InvalidUriError {
        fn from(value: http::uri::InvalidUri) -> Self {
            InvalidUriError(value.to_string())
        }
    }

    impl From<http::uri::InvalidUriParts> for InvalidUriError {
        fn from(value: http::uri::InvalidUriParts) -> Self {
            InvalidUriError(value.to_string())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct Uri(http::Uri);

    impl Uri {
        pub fn new(uri: http::Uri) -> Self {
            Self(uri)
        }

        /// Parse an endpoint that may be given either as a full URI or as a
        /// bare host name, e.g. `global.azure-devices-provisioning.net`.
        ///
        /// Bare host names are assumed to be served over `https`.
        pub fn from_host_or_uri(src: &str) -> Result<Self, InvalidUriError> {
            if src.contains("://") {
                src.parse()
            } else {
                Self::from_string(format!("https://{src}"))
            }
        }

        pub fn from_string(src: String) -> Result<Self, InvalidUriError> {
            Ok(Self(http::uri::Uri::from_maybe_shared(src)?))
        }

        /// Build a new URI from the scheme and authority of `base_uri` and
        /// the given path and query string.
        ///
        /// Any path on `base_uri` is kept as a prefix of `path`.
        pub fn from_parts(
            base_uri: Uri,
            path: &str,
            query: Option<&str>,
        ) -> Result<Self, InvalidUriError> {
            let prefix = base_uri.0.path().trim_end_matches('/');
            let path = format!("{prefix}{path}");
            let path_and_query = if let Some(qs) = query {
                http::uri::PathAndQuery::from_maybe_shared(format!("{path}?{qs}"))?
            } else {
                http::uri::PathAndQuery::from_str(&path)?
            };
            let mut parts = base_uri.0.into_parts();
            parts.path_and_query = Some(path_and_query);

            Ok(http::Uri::from_parts(parts).map(Self::new)?)
        }

        pub fn host(&self) -> Option<&str> {
            self.0.host()
        }
    }

    impl Display for Uri {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl FromStr for Uri {
        type Err = InvalidUriError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Ok(http::Uri::from_str(s).map(Self::new)?)
        }
    }

    impl TryFrom<String> for Uri {
        type Error = InvalidUriError;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            Ok(Self(http::Uri::from_maybe_shared(value)?))
        }
    }

    impl From<http::Uri> for Uri {
        fn from(value: http::Uri) -> Self {
            Self(value)
        }
    }

    impl From<Uri> for http::Uri {
        fn from(value: Uri) -> Self {
            value.0
        }
    }

    impl Serialize for Uri {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_str(&self.to_string())
        }
    }

    impl<'de> Deserialize<'de> for Uri {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        }
    }
}

mod client {
    use std::collections::HashMap;
    use std::convert::TryInto;
    use std::time::Duration;

    use reqwest::RequestBuilder;
    use serde::Serialize;
    use serde::de::DeserializeOwned;

    use super::uri::Uri;

    pub type Method = reqwest::Method;
    pub type StatusCode = reqwest::StatusCode;
    pub type HeaderMap = reqwest::header::HeaderMap;
    pub type Headers = HashMap<String, String>;

    #[derive(Debug, thiserror::Error)]
    pub enum ClientError {
        #[error("failed to build request: {0}")]
        Request(String),

        #[error("server replied with status: {0}")]
        Response(StatusCode),

        #[error(transparent)]
        Client(reqwest::Error),

        #[error(transparent)]
        Server(reqwest::Error),
    }

    impl ClientError {
        /// The HTTP status that caused this error, if the exchange got as
        /// far as receiving one.
        pub fn status(&self) -> Option<StatusCode> {
            match self {
                ClientError::Request(_) => None,
                ClientError::Response(status) => Some(*status),
                ClientError::Client(err) | ClientError::Server(err) => err.status(),
            }
        }
    }

    #[derive(Debug)]
    pub struct Response(reqwest::Response);

    impl Response {
        pub fn status(&self) -> StatusCode {
            self.0.status()
        }

        pub async fn json<T: DeserializeOwned>(self) -> Result<T, ClientError> {
            self.0.json().await.map_err(ClientError::Server)
        }
    }

    #[derive(Debug, Clone)]
    pub struct Client {
        client: reqwest::Client,
        timeout: Option<Duration>,
    }

    impl Default for Client {
        /// Default client with a timeout of 59 seconds.
        fn default() -> Self {
            Self::new(Some(Duration::from_secs(59)))
        }
    }

    impl Client {
        pub fn new(timeout: Option<Duration>) -> Self {
            Self {
                client: reqwest::Client::new(),
                timeout,
            }
        }

        pub async fn get<Response>(
            &self,
            uri: &Uri,
            headers: Option<&Headers>,
        ) -> Result<Response, ClientError>
        where
            Response: DeserializeOwned,
        {
            wrap_status_error(
                self.request(Method::GET, uri, |req| {
                    let headers = headers
                        .map(into_header_map)
                        .unwrap_or(Ok(HeaderMap::new()))?;
                    Ok(req.headers(headers))
                })
                .await?,
            )?
            .json()
            .await
        }

        pub async fn put<Payload, Response>(
            &self,
            uri: &Uri,
            headers: Option<&Headers>,
            payload: &Payload,
        ) -> Result<Response, ClientError>
        where
            Payload: Serialize + ?Sized,
            Response: DeserializeOwned,
        {
            wrap_status_error(
                self.request(Method::PUT, uri, |req| {
                    let headers = headers
                        .map(into_header_map)
                        .unwrap_or(Ok(HeaderMap::new()))?;
                    Ok(req.headers(headers).json(payload))
                })
                .await?,
            )?
            .json()
            .await
        }

        /// Thin wrapper around [reqwest::Request], this is your gateway to
        /// a fully customizable client if this type's methods won't do.
        pub async fn request<D>(
            &self,
            method: Method,
            uri: &Uri,
            decorator: D,
        ) -> Result<Response, ClientError>
        where
            D: FnOnce(RequestBuilder) -> Result<RequestBuilder, ClientError>,
        {
            let mut request = self.client.request(method, uri.to_string());

            if let Some(timeout) = self.timeout {
                request = request.timeout(timeout);
            }

            request = decorator(request)?;

            Ok(Response(request.send().await.map_err(ClientError::Client)?))
        }
    }

    /// Convert headers into a [HeaderMap].
    ///
    /// This will return a [ClientError] for any non-ASCII keys or values.
    fn into_header_map(headers: &Headers) -> Result<HeaderMap, ClientError> {
        headers
            .try_into()
            .map_err(|err: http::Error| ClientError::Request(err.to_string()))
    }

    fn wrap_status_error(res: Response) -> Result<Response, ClientError> {
        match res.status() {
            status if status.is_success() => Ok(res),
            status => Err(ClientError::Response(status)),
        }
    }
}
