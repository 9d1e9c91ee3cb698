use crate::config::sources::ServiceConfig;
use crate::upstream::datasets::Dataset;

pub fn initiate_default_values(mut config: ServiceConfig) -> ServiceConfig {
    // every dataset gets an endpoint; explicit overrides win
    for dataset in Dataset::ALL {
        config
            .cache
            .datasets
            .entry(dataset)
            .or_insert_with(|| dataset.default_endpoint());
    }

    // trailing slash would double up with the dataset paths
    while config.upstream.api_base.ends_with('/') {
        config.upstream.api_base.pop();
    }

    // an empty fallback block is the same as none
    if config
        .fallback_credentials
        .as_ref()
        .filter(|creds| creds.username.is_empty() && creds.password.is_empty())
        .is_some()
    {
        config.fallback_credentials = None;
    }

    config
}
