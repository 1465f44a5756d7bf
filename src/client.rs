use std::collections::HashSet;
use std::sync::Arc;

use reqwest::{
    Client, RequestBuilder, StatusCode,
    header::{HeaderName, HeaderValue},
};
use serde_json::Value;

use crate::models::{
    AcademicTerm, Classroom, Course, Exam, NewsItem, Professor, Record, UserClass, UserCourse,
    UserNotice, UserProfile,
};
use crate::{ApiConfig, ApiError, OAuthSession};

/// HTTP access to the FIB data API.
///
/// Public resources are requested with the application's `client_id` header;
/// private ones with a bearer token from the attached [`OAuthSession`]. Nothing
/// is retried: every failure is returned to the caller as an [`ApiError`].
#[derive(Debug, Clone)]
pub struct FibClient {
    config: ApiConfig,
    http: Client,
    session: Option<Arc<OAuthSession>>,
}

impl FibClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_http_client(config, http))
    }

    pub fn with_http_client(config: ApiConfig, http: Client) -> Self {
        Self {
            config,
            http,
            session: None,
        }
    }

    pub fn with_session(mut self, session: Arc<OAuthSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Arc<OAuthSession>> {
        self.session.as_ref()
    }

    /// True when a session is attached and holds a credential.
    pub fn is_authenticated(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_authenticated())
    }

    pub async fn get_public(&self, resource: &str) -> Result<Value, ApiError> {
        self.fetch(&self.endpoint_url(resource), &self.public_headers())
            .await
    }

    pub async fn get_public_record<R: Record>(&self, resource: &str) -> Result<R, ApiError> {
        let value = self.get_public(resource).await?;
        Ok(R::from_json(&value)?)
    }

    pub async fn get_public_paginated<R: Record>(
        &self,
        resource: &str,
    ) -> Result<Vec<R>, ApiError> {
        self.paginate(resource, &self.public_headers()).await
    }

    pub async fn get_private(&self, resource: &str) -> Result<Value, ApiError> {
        let headers = self.private_headers().await?;
        self.fetch(&self.endpoint_url(resource), &headers).await
    }

    pub async fn get_private_record<R: Record>(&self, resource: &str) -> Result<R, ApiError> {
        let value = self.get_private(resource).await?;
        Ok(R::from_json(&value)?)
    }

    pub async fn get_private_paginated<R: Record>(
        &self,
        resource: &str,
    ) -> Result<Vec<R>, ApiError> {
        let headers = self.private_headers().await?;
        self.paginate(resource, &headers).await
    }

    pub async fn courses(&self) -> Result<Vec<Course>, ApiError> {
        self.get_public_paginated("assignatures").await
    }

    pub async fn course(&self, course_id: &str) -> Result<Course, ApiError> {
        self.get_public_record(&format!("assignatures/{course_id}"))
            .await
    }

    pub async fn exams(&self) -> Result<Vec<Exam>, ApiError> {
        self.get_public_paginated("examens").await
    }

    pub async fn professors(&self) -> Result<Vec<Professor>, ApiError> {
        self.get_public_paginated("professors").await
    }

    pub async fn classrooms(&self) -> Result<Vec<Classroom>, ApiError> {
        self.get_public_paginated("aules").await
    }

    pub async fn academic_terms(&self) -> Result<Vec<AcademicTerm>, ApiError> {
        self.get_public_paginated("quadrimestres").await
    }

    pub async fn news(&self) -> Result<Vec<NewsItem>, ApiError> {
        self.get_public_paginated("noticies").await
    }

    pub async fn my_profile(&self) -> Result<UserProfile, ApiError> {
        self.get_private_record("jo").await
    }

    pub async fn my_courses(&self) -> Result<Vec<UserCourse>, ApiError> {
        self.get_private_paginated("jo/assignatures").await
    }

    pub async fn my_classes(&self) -> Result<Vec<UserClass>, ApiError> {
        self.get_private_paginated("jo/classes").await
    }

    pub async fn my_notices(&self) -> Result<Vec<UserNotice>, ApiError> {
        self.get_private_paginated("jo/avisos").await
    }

    /// Follows `next` links until the last page. A bare list ends the walk, as
    /// does a lone object without a `results` envelope (read as one record).
    /// A `next` link to a page already fetched is an error.
    async fn paginate<R: Record>(
        &self,
        resource: &str,
        headers: &[(String, String)],
    ) -> Result<Vec<R>, ApiError> {
        let mut records = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(self.endpoint_url(resource));

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                return Err(ApiError::InvalidJson {
                    message: format!("pagination loops back to {url}"),
                    body: String::new(),
                });
            }
            let page = self.fetch(&url, headers).await?;
            match page {
                Value::Array(items) => {
                    records.extend(parse_records::<R>(&items)?);
                }
                Value::Object(envelope) if envelope.contains_key("results") => {
                    let Some(Value::Array(items)) = envelope.get("results") else {
                        return Err(ApiError::InvalidJson {
                            message: "`results` is not a list".to_string(),
                            body: Value::Object(envelope.clone()).to_string(),
                        });
                    };
                    records.extend(parse_records::<R>(items)?);
                    next = envelope
                        .get("next")
                        .and_then(Value::as_str)
                        .filter(|link| !link.is_empty())
                        .map(str::to_string);
                }
                other => records.push(R::from_json(&other)?),
            }
            tracing::debug!(
                record = R::NAME,
                fetched = records.len(),
                more = next.is_some(),
                "fetched page"
            );
        }

        Ok(records)
    }

    async fn fetch(&self, url: &str, headers: &[(String, String)]) -> Result<Value, ApiError> {
        tracing::debug!(%url, "GET");
        let builder = apply_headers(self.http.get(url), headers)?;
        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;
        check_status(status, url, &body)?;

        serde_json::from_str(&body).map_err(|err| ApiError::InvalidJson {
            message: err.to_string(),
            body,
        })
    }

    fn endpoint_url(&self, resource: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            resource.trim_start_matches('/')
        )
    }

    fn public_headers(&self) -> Vec<(String, String)> {
        vec![
            ("client_id".to_string(), self.config.client_id.clone()),
            ("Accept".to_string(), "application/json".to_string()),
            ("Accept-Language".to_string(), self.config.language.clone()),
        ]
    }

    async fn private_headers(&self) -> Result<Vec<(String, String)>, ApiError> {
        let session = self.session.as_ref().ok_or(ApiError::AuthRequired)?;
        let token = session.get_access_token().await?;
        Ok(vec![
            ("Authorization".to_string(), format!("Bearer {token}")),
            ("Accept".to_string(), "application/json".to_string()),
            ("Accept-Language".to_string(), self.config.language.clone()),
        ])
    }
}

/// Maps an error status to its typed error. Runs before the body is parsed.
pub(crate) fn check_status(status: StatusCode, url: &str, body: &str) -> Result<(), ApiError> {
    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Authentication {
            body: body.to_string(),
        }),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound {
            url: url.to_string(),
        }),
        StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimited {
            body: body.to_string(),
        }),
        status if status.as_u16() >= 400 => Err(ApiError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        }),
        _ => Ok(()),
    }
}

fn parse_records<R: Record>(items: &[Value]) -> Result<Vec<R>, ApiError> {
    items
        .iter()
        .map(|item| R::from_json(item).map_err(ApiError::from))
        .collect()
}

fn apply_headers(
    mut builder: RequestBuilder,
    headers: &[(String, String)],
) -> Result<RequestBuilder, ApiError> {
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| ApiError::InvalidHeader {
            name: name.clone(),
            value: value.clone(),
        })?;
        // Bearer tokens are never echoed into errors.
        let value = HeaderValue::from_str(value).map_err(|_| ApiError::InvalidHeader {
            name: name.to_string(),
            value: "<redacted>".to_string(),
        })?;
        builder = builder.header(name, value);
    }
    Ok(builder)
}
