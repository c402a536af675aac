use super::{user_agent, Request};
use reqwest::header::{
    HeaderMap, HeaderValue, CACHE_CONTROL, CONNECTION, USER_AGENT,
};
use std::borrow::Cow;

#[derive(Copy, Clone)]
pub(crate) struct Download {
    pub bytes: u64,
}

impl Request for Download {
    type Response = String;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/__down?bytes={}", self.bytes).into()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, user_agent());

        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        headers
    }
}
