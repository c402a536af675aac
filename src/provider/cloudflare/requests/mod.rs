pub mod download;
pub mod locations;
pub mod meta;
pub mod upload;

use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Method,
};
use serde::de::DeserializeOwned;
use std::borrow::Cow;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Body attached to an outgoing request.
pub enum RequestBody {
    None,
    Bytes(Vec<u8>),
}

pub trait Request {
    type Response: DeserializeOwned;

    const METHOD: Method = Method::GET;

    fn endpoint(&self) -> Cow<'_, str>;

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, user_agent());

        headers
    }

    fn body(&self) -> RequestBody {
        RequestBody::None
    }
}

impl<R: Request> Request for &R {
    type Response = R::Response;

    const METHOD: Method = R::METHOD;

    fn endpoint(&self) -> Cow<'_, str> {
        (**self).endpoint()
    }

    fn headers(&self) -> HeaderMap {
        (**self).headers()
    }

    fn body(&self) -> RequestBody {
        (**self).body()
    }
}

pub(crate) fn user_agent() -> HeaderValue {
    HeaderValue::from_str(&format!("{}/{}", NAME, VERSION))
        .unwrap_or_else(|_| HeaderValue::from_static("netspeed"))
}
