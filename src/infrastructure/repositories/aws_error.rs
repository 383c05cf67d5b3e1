use crate::domain::audio::error::GenerationError;

/// Map an AWS error code to the pipeline's failure taxonomy. Every code maps
/// to exactly one kind; unmapped codes are `Unknown`.
pub fn classify_aws_code(code: &str) -> GenerationError {
    match code {
        "ThrottlingException" | "Throttling" | "TooManyRequestsException"
        | "RequestLimitExceeded" | "SlowDown" => GenerationError::Throttled,

        "InvalidParameterValue" | "InvalidSsmlException" | "TextLengthExceededException"
        | "LanguageNotSupportedException" | "InvalidSampleRateException"
        | "LexiconNotFoundException" | "MarksNotSupportedForFormatException" => {
            GenerationError::InvalidInput
        }

        "ServiceUnavailable" | "ServiceUnavailableException" | "ServiceFailureException"
        | "InternalFailure" | "InternalError" => GenerationError::ServiceUnavailable,

        "AccessDenied" | "AccessDeniedException" | "UnrecognizedClientException"
        | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken"
        | "NoSuchBucket" => GenerationError::AccessConfig,

        _ => GenerationError::Unknown,
    }
}
