// API request flow
//
// Four linear steps, no conditional ones.

use super::{StepValidator, WizardFlow};
use crate::models::steps::StepDescriptor;
use crate::models::validation::{codes, StepValidationResult, ValidationReport};
use crate::utils::validation::{first_duplicate, is_blank, is_valid_owner_id, parse_http_url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

pub const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];
pub const AUTH_SCHEMES: &[&str] = &["oauth2", "apiKey", "mtls"];
pub const MAX_RATE_LIMIT_PER_MINUTE: u32 = 100_000;
pub const MIN_JUSTIFICATION_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiRequestStep {
    RequestDetails,
    Endpoint,
    Access,
    Review,
}

impl fmt::Display for ApiRequestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RequestDetails => "request-details",
            Self::Endpoint => "endpoint",
            Self::Access => "access",
            Self::Review => "review",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestDetails {
    pub api_name: String,
    pub description: String,
    pub justification: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoint {
    pub method: String,
    pub base_url: String,
    pub path: String,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            base_url: String::new(),
            path: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Access {
    /// Owner ids of the consuming teams.
    pub consumers: Vec<String>,
    pub rate_limit_per_minute: u32,
    pub auth_scheme: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiReview {
    pub confirmed: bool,
    pub comments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiRequestFormData {
    pub request_details: RequestDetails,
    pub endpoint: Endpoint,
    pub access: Access,
    pub review: ApiReview,
}

pub struct ApiRequestFlow;

impl WizardFlow for ApiRequestFlow {
    type Step = ApiRequestStep;
    type Data = ApiRequestFormData;

    const NAME: &'static str = "api-request";

    fn steps() -> Vec<StepDescriptor<ApiRequestStep, ApiRequestFormData>> {
        vec![
            StepDescriptor::new(
                ApiRequestStep::RequestDetails,
                "Request Details",
                "What API do you need and why",
                "mdi-text-box-outline",
                "requestDetails",
            ),
            StepDescriptor::new(
                ApiRequestStep::Endpoint,
                "Endpoint",
                "Where the API is served",
                "mdi-api",
                "endpoint",
            ),
            StepDescriptor::new(
                ApiRequestStep::Access,
                "Access",
                "Consumers and limits",
                "mdi-shield-account",
                "access",
            ),
            StepDescriptor::new(
                ApiRequestStep::Review,
                "Review",
                "Confirm and submit",
                "mdi-check-decagram",
                "review",
            ),
        ]
    }

    fn validator(step: ApiRequestStep) -> StepValidator<ApiRequestFormData> {
        match step {
            ApiRequestStep::RequestDetails => validate_request_details,
            ApiRequestStep::Endpoint => validate_endpoint,
            ApiRequestStep::Access => validate_access,
            ApiRequestStep::Review => validate_review,
        }
    }

    fn draft_title(data: &ApiRequestFormData) -> Option<String> {
        let name = data.request_details.api_name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    fn summarize(data: &ApiRequestFormData) -> serde_json::Value {
        json!({
            "apiName": data.request_details.api_name.trim(),
            "method": data.endpoint.method.trim().to_ascii_uppercase(),
            "endpoint": format!(
                "{}{}",
                data.endpoint.base_url.trim().trim_end_matches('/'),
                data.endpoint.path.trim()
            ),
            "consumers": data.access.consumers.len(),
            "rateLimitPerMinute": data.access.rate_limit_per_minute,
        })
    }
}

fn validate_request_details(data: &ApiRequestFormData) -> StepValidationResult {
    let details = &data.request_details;
    let mut report = ValidationReport::new();

    report.require("apiName", &details.api_name, "API name");
    if report.require("justification", &details.justification, "Business justification")
        && details.justification.trim().chars().count() < MIN_JUSTIFICATION_LEN
    {
        report.error(
            "justification",
            codes::TOO_SHORT,
            format!(
                "Justification must be at least {} characters",
                MIN_JUSTIFICATION_LEN
            ),
        );
    }
    if is_blank(&details.description) {
        report.warning(
            "description",
            codes::RECOMMENDED,
            "A short description helps reviewers",
        );
    }

    report.finish()
}

fn validate_endpoint(data: &ApiRequestFormData) -> StepValidationResult {
    let ep = &data.endpoint;
    let mut report = ValidationReport::new();

    let method = ep.method.trim().to_ascii_uppercase();
    if !HTTP_METHODS.contains(&method.as_str()) {
        report.error(
            "method",
            codes::UNSUPPORTED,
            format!("Unsupported HTTP method '{}'", ep.method.trim()),
        );
    }

    if report.require("baseUrl", &ep.base_url, "Base URL") {
        match parse_http_url(&ep.base_url) {
            Ok(url) if url.scheme() == "http" => {
                report.warning("baseUrl", codes::INSECURE_URL, "Base URL is not using HTTPS")
            }
            Ok(_) => {}
            Err(msg) => report.error("baseUrl", codes::INVALID_URL, msg),
        }
    }

    if !ep.path.trim().starts_with('/') {
        report.error("path", codes::INVALID_FORMAT, "Path must start with '/'");
    }

    report.finish()
}

fn validate_access(data: &ApiRequestFormData) -> StepValidationResult {
    let access = &data.access;
    let mut report = ValidationReport::new();

    if access.consumers.is_empty() {
        report.error(
            "consumers",
            codes::MIN_ITEMS,
            "At least one consumer is required",
        );
    }
    for (i, consumer) in access.consumers.iter().enumerate() {
        if !is_valid_owner_id(consumer) {
            report.error(
                format!("consumers[{}]", i),
                codes::INVALID_OWNER_ID,
                format!("'{}' is not a valid owner id", consumer.trim()),
            );
        }
    }
    if let Some(dup) = first_duplicate(access.consumers.iter().map(String::as_str)) {
        report.warning(
            "consumers",
            codes::DUPLICATE,
            format!("Consumer '{}' is listed twice", dup),
        );
    }

    if access.rate_limit_per_minute == 0 || access.rate_limit_per_minute > MAX_RATE_LIMIT_PER_MINUTE
    {
        report.error(
            "rateLimitPerMinute",
            codes::OUT_OF_RANGE,
            format!(
                "Rate limit must be between 1 and {} requests per minute",
                MAX_RATE_LIMIT_PER_MINUTE
            ),
        );
    }

    if report.require("authScheme", &access.auth_scheme, "Authentication scheme")
        && !AUTH_SCHEMES.contains(&access.auth_scheme.trim())
    {
        report.error(
            "authScheme",
            codes::UNSUPPORTED,
            format!("Unsupported authentication scheme '{}'", access.auth_scheme.trim()),
        );
    }

    report.finish()
}

fn validate_review(data: &ApiRequestFormData) -> StepValidationResult {
    let mut report = ValidationReport::new();
    if !data.review.confirmed {
        report.error(
            "confirmed",
            codes::NOT_CONFIRMED,
            "Confirm the request before submitting",
        );
    }
    report.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_data() -> ApiRequestFormData {
        ApiRequestFormData {
            request_details: RequestDetails {
                api_name: "Customer Lookup".to_string(),
                description: "Read-only customer profile API".to_string(),
                justification: "Needed by the support portal for ticket triage".to_string(),
            },
            endpoint: Endpoint {
                method: "get".to_string(),
                base_url: "https://api.example.com".to_string(),
                path: "/v1/customers".to_string(),
            },
            access: Access {
                consumers: vec!["A123456".to_string()],
                rate_limit_per_minute: 600,
                auth_scheme: "oauth2".to_string(),
            },
            review: ApiReview {
                confirmed: true,
                comments: String::new(),
            },
        }
    }

    #[test]
    fn four_unconditional_steps() {
        let steps = ApiRequestFlow::steps();
        assert_eq!(steps.len(), 4);
        assert!(steps.iter().all(|s| !s.is_conditional() && s.required));
    }

    #[test]
    fn valid_data_passes_every_step() {
        let data = valid_data();
        for step in ApiRequestFlow::steps() {
            let result = ApiRequestFlow::validator(step.id)(&data);
            assert!(result.valid, "{} failed: {:?}", step.id, result.errors);
        }
    }

    #[test]
    fn short_justification_is_rejected() {
        let mut data = valid_data();
        data.request_details.justification = "because".to_string();
        let result = validate_request_details(&data);
        assert_eq!(result.errors[0].code, codes::TOO_SHORT);
    }

    #[test]
    fn endpoint_checks_method_url_and_path() {
        let mut data = valid_data();
        data.endpoint = Endpoint {
            method: "FETCH".to_string(),
            base_url: "ftp://files.example.com".to_string(),
            path: "v1".to_string(),
        };
        let result = validate_endpoint(&data);
        assert!(result.has_error_on("method"));
        assert!(result.has_error_on("baseUrl"));
        assert!(result.has_error_on("path"));

        data.endpoint = Endpoint {
            base_url: "http://api.example.com".to_string(),
            ..Endpoint::default()
        };
        let result = validate_endpoint(&data);
        assert!(result.valid);
        assert!(result.has_warning_on("baseUrl"));
    }

    #[test]
    fn access_needs_consumers_and_sane_rate_limit() {
        let mut data = valid_data();
        data.access.consumers = vec!["team-x".to_string()];
        data.access.rate_limit_per_minute = 0;
        data.access.auth_scheme = "basic".to_string();
        let result = validate_access(&data);
        assert!(result.has_error_on("consumers[0]"));
        assert!(result.has_error_on("rateLimitPerMinute"));
        assert!(result.has_error_on("authScheme"));

        data.access.consumers.clear();
        assert!(validate_access(&data).has_error_on("consumers"));
    }

    #[test]
    fn summary_joins_endpoint() {
        let summary = ApiRequestFlow::summarize(&valid_data());
        assert_eq!(summary["endpoint"], "https://api.example.com/v1/customers");
        assert_eq!(summary["method"], "GET");
    }
}
