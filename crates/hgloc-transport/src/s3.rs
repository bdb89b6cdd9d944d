//! S3-compatible backend built on `aws-sdk-s3`.
//!
//! The SDK is async; this store owns a current-thread tokio runtime and
//! `block_on`s every request. Do not call it from inside another runtime.

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{Region, SharedCredentialsProvider};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::{Client, Config};
use hgloc_types::{BucketScope, Credentials};
use std::path::Path;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::StoreError;
use crate::object_store::{ListPage, ObjectHead, ObjectStore, ObjectSummary, PutOptions};

pub struct S3ObjectStore {
    runtime: Runtime,
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client for `scope` with static credentials. Performs no network I/O.
    pub fn new(scope: &BucketScope, credentials: &Credentials, region: &str) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Io(format!("failed to start runtime: {}", e)))?;

        let creds = aws_sdk_s3::config::Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            None,
            None,
            "hgloc",
        );
        let mut builder = Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(SharedCredentialsProvider::new(creds));
        if let Some(endpoint) = scope.endpoint() {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            runtime,
            client: Client::from_conf(builder.build()),
            bucket: scope.bucket_name.clone(),
        })
    }
}

/// Map an SDK error onto the transport taxonomy.
fn classify<E>(err: SdkError<E, HttpResponse>, key: &str) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match &err {
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            let code = ctx.err().code().unwrap_or("");
            match (status, code) {
                (404, _) | (_, "NoSuchKey") | (_, "NotFound") | (_, "NoSuchBucket") => {
                    StoreError::NotFound(key.to_string())
                }
                (401, _) | (403, _) | (_, "AccessDenied") | (_, "InvalidAccessKeyId")
                | (_, "SignatureDoesNotMatch") => StoreError::AccessDenied(key.to_string()),
                _ => StoreError::Service(format!("{} (HTTP {}): {}", key, status, DisplayErrorContext(&err))),
            }
        }
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            StoreError::Transport(format!("{}: {}", key, DisplayErrorContext(&err)))
        }
        _ => StoreError::Service(format!("{}: {}", key, DisplayErrorContext(&err))),
    }
}

impl ObjectStore for S3ObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn head(&self, key: &str) -> Result<ObjectHead, StoreError> {
        let out = self
            .runtime
            .block_on(self.client.head_object().bucket(&self.bucket).key(key).send())
            .map_err(|e| classify(e, key))?;
        Ok(ObjectHead {
            size: out.content_length().unwrap_or(0).max(0) as u64,
            content_type: out.content_type().map(str::to_string),
        })
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.runtime.block_on(async {
            let out = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| classify(e, key))?;
            let body = out
                .body
                .collect()
                .await
                .map_err(|e| StoreError::Transport(format!("{}: {}", key, e)))?;
            Ok(body.into_bytes().to_vec())
        })
    }

    fn put(&self, key: &str, body: Vec<u8>, options: &PutOptions) -> Result<(), StoreError> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_content_type(options.content_type.clone())
            .set_acl(options.public_read.then_some(ObjectCannedAcl::PublicRead));
        self.runtime
            .block_on(request.send())
            .map_err(|e| classify(e, key))?;
        debug!(bucket = %self.bucket, key, public = options.public_read, "put object");
        Ok(())
    }

    fn put_file(&self, key: &str, path: &Path, options: &PutOptions) -> Result<(), StoreError> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(path)
                .await
                .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .set_content_type(options.content_type.clone())
                .set_acl(options.public_read.then_some(ObjectCannedAcl::PublicRead))
                .send()
                .await
                .map_err(|e| classify(e, key))?;
            Ok(())
        })
    }

    fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_delimiter(delimiter.map(str::to_string))
            .set_continuation_token(continuation_token.map(str::to_string));
        let out = self
            .runtime
            .block_on(request.send())
            .map_err(|e| classify(e, prefix))?;

        let objects = out
            .contents()
            .iter()
            .filter_map(|obj| {
                obj.key().map(|key| ObjectSummary {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                })
            })
            .collect();
        let common_prefixes = out
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();
        let next_token = if out.is_truncated().unwrap_or(false) {
            out.next_continuation_token().map(str::to_string)
        } else {
            None
        };
        Ok(ListPage {
            objects,
            common_prefixes,
            next_token,
        })
    }

    fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StoreError::Service(format!("invalid presign ttl: {}", e)))?;
        let request = self
            .runtime
            .block_on(
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .presigned(presigning),
            )
            .map_err(|e| classify(e, key))?;
        Ok(request.uri().to_string())
    }

    fn probe_bucket(&self) -> Result<(), StoreError> {
        self.runtime
            .block_on(self.client.head_bucket().bucket(&self.bucket).send())
            .map_err(|e| classify(e, &self.bucket))?;
        Ok(())
    }
}
