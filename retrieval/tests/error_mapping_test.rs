use engram_core::config::InvalidConfig;
use engram_core::error::{EngramError, ErrorCode};
use retrieval::RetrieverError;
use stores::StoreError;

#[test]
fn configuration_errors_map_to_invalid_argument() {
    let error = RetrieverError::Config(InvalidConfig::NonPositiveDepth);
    assert_eq!(error.error_code(), ErrorCode::InvalidArgument);

    let error = RetrieverError::Config(InvalidConfig::AllWeightsZero);
    assert_eq!(error.error_code(), ErrorCode::InvalidArgument);
}

#[test]
fn provider_failures_map_to_unavailable() {
    let error = RetrieverError::Store(StoreError::Embedding(
        "embedding request failed with 503".to_string(),
    ));
    assert_eq!(error.error_code(), ErrorCode::Unavailable);
}

#[test]
fn server_side_rejections_map_to_internal() {
    let error = RetrieverError::Store(StoreError::Rejected("syntax error".to_string()));
    assert_eq!(error.error_code(), ErrorCode::Internal);

    let error = RetrieverError::Store(StoreError::Decode("short row".to_string()));
    assert_eq!(error.error_code(), ErrorCode::Internal);
}

#[test]
fn error_messages_carry_their_context() {
    let error = RetrieverError::Config(InvalidConfig::WeightOutOfRange {
        name: "bm25_weight",
        value: 1.5,
    });
    assert_eq!(
        error.to_string(),
        "invalid configuration: bm25_weight must be between 0 and 1, got 1.5"
    );
}
