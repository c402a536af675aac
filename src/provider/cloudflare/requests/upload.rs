use super::{user_agent, Request, RequestBody};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, USER_AGENT};
use reqwest::Method;
use std::borrow::Cow;

pub(crate) struct Upload {
    data: Vec<u8>,
}

impl Upload {
    pub fn new(bytes: u64) -> Self {
        Self { data: vec![b'0'; bytes as usize] }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

impl Request for Upload {
    type Response = String;

    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        "/__up".into()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, user_agent());

        headers.insert(CONTENT_LENGTH, self.data.len().into());

        headers
    }

    fn body(&self) -> RequestBody {
        RequestBody::Bytes(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_payload_size() {
        let upload = Upload::new(1_000);
        assert_eq!(upload.len(), 1_000);
        assert_eq!(upload.headers()[CONTENT_LENGTH], "1000");
        assert!(matches!(upload.body(), RequestBody::Bytes(ref b) if b.len() == 1_000));
    }
}
