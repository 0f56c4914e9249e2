//! AWS SDK implementation of [`ObjectClient`].
//!
//! Every backend-version-sensitive detail -- error codes, raw HTTP
//! statuses, body representations -- is confined to this module:
//! [`classify`] is the one place an SDK error shape is turned into a
//! [`ClientError`] condition, and `get_object` is the one place a transport
//! body is normalized to bytes.

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use crate::client::{ClientError, ClientResult, ObjectClient, ObjectPage};

/// [`ObjectClient`] backed by `aws-sdk-s3`, bound to one bucket.
#[derive(Clone, Debug)]
pub struct AwsObjectClient {
    client: Client,
    bucket: String,
}

impl AwsObjectClient {
    /// Wrap an existing SDK client, binding it to `bucket`.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        AwsObjectClient {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the ambient AWS configuration (environment,
    /// profile, instance metadata).
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        AwsObjectClient::new(Client::new(&config), bucket)
    }

    /// The bucket this client addresses.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Translate an SDK error into the closed [`ClientError`] condition set.
///
/// Matches on the service error code where one is present and falls back to
/// the raw HTTP status; HEAD responses carry no body, so a 404/403 there has
/// a status but no code. A missing bucket also reports 404, so its code is
/// checked before the status fallback.
fn classify<E>(err: &SdkError<E>) -> ClientError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let status = err.raw_response().map(|res| res.status().as_u16());
    let code = err.code().unwrap_or_default();

    if code == "NoSuchBucket" {
        ClientError::BucketMissing
    } else if code == "NoSuchKey" || code == "NotFound" || status == Some(404) {
        ClientError::NotFound
    } else if code == "AccessDenied" || status == Some(403) {
        ClientError::Forbidden
    } else if code == "PreconditionFailed" || status == Some(412) {
        ClientError::AlreadyExists
    } else {
        ClientError::Backend {
            code: if code.is_empty() {
                "Unknown".to_string()
            } else {
                code.to_string()
            },
            message: err.message().map_or_else(|| err.to_string(), str::to_owned),
        }
    }
}

#[async_trait]
impl ObjectClient for AwsObjectClient {
    async fn put_object(&self, name: &str, body: Bytes) -> ClientResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|err| classify(&err))
    }

    async fn put_object_if_absent(&self, name: &str, body: Bytes) -> ClientResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .if_none_match("*")
            .body(ByteStream::from(body))
            .send()
            .await
            .map(|_| ())
            .map_err(|err| classify(&err))
    }

    async fn get_object(&self, name: &str) -> ClientResult<Bytes> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|err| classify(&err))?;

        // Drain the streaming body into one contiguous byte sequence.
        let data = out
            .body
            .collect()
            .await
            .map_err(|err| ClientError::backend("BodyRead", err.to_string()))?;
        Ok(data.into_bytes())
    }

    async fn head_object(&self, name: &str) -> ClientResult<()> {
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| classify(&err))
    }

    async fn delete_object(&self, name: &str) -> ClientResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| classify(&err))
    }

    async fn list_objects(
        &self,
        prefix: &str,
        start_after: Option<&str>,
    ) -> ClientResult<ObjectPage> {
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix);
        if let Some(marker) = start_after {
            req = req.start_after(marker);
        }
        let out = req.send().await.map_err(|err| classify(&err))?;

        let names: Vec<String> = out
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_owned))
            .collect();
        debug!(
            prefix,
            count = names.len(),
            truncated = out.is_truncated().unwrap_or(false),
            "listed one page"
        );
        Ok(ObjectPage {
            names,
            truncated: out.is_truncated().unwrap_or(false),
        })
    }

    async fn create_bucket(&self) -> ClientResult<()> {
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            // A concurrent creator winning the race still leaves the bucket
            // usable by us.
            Err(err)
                if matches!(
                    err.code(),
                    Some("BucketAlreadyOwnedByYou") | Some("BucketAlreadyExists")
                ) =>
            {
                Ok(())
            }
            Err(err) => Err(classify(&err)),
        }
    }
}
