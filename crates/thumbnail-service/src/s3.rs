use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{config::Builder as S3ConfigBuilder, Client};

use crate::config::S3Settings;

/// Build an S3 client for MinIO, R2 or AWS.
///
/// Static credentials are used when both keys are configured; otherwise the
/// default provider chain applies.
pub async fn s3_client(cfg: &S3Settings) -> Client {
    let region = Region::new(cfg.region.clone());
    let region_provider = RegionProviderChain::first_try(region.clone()).or_default_provider();
    let base = aws_config::defaults(BehaviorVersion::v2025_08_07())
        .region(region_provider)
        .load()
        .await;

    let mut conf = S3ConfigBuilder::from(&base)
        .region(region)
        .force_path_style(true);

    if let Some(endpoint) = &cfg.endpoint {
        conf = conf.endpoint_url(endpoint.clone());
    }

    if let (Some(access_key), Some(secret_key)) = (&cfg.access_key, &cfg.secret_key) {
        conf = conf.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }

    Client::from_conf(conf.build())
}
