//! HTTP Handlers

use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use platform::client::{ClientContext, extract_bearer_token};
use platform::cookie::extract_cookie;
use platform::rate_limit::{DailyRateLimiter, RateLimitStore};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::application::config::QuizConfig;
use crate::application::list_questions::ListQuestionsUseCase;
use crate::application::session_token::SessionTokenCodec;
use crate::application::start_session::{StartSessionOutput, StartSessionUseCase};
use crate::application::submit_quiz::{Admission, SubmitQuizInput, SubmitQuizUseCase};
use crate::domain::ports::{CaptchaVerifier, CrmSink};
use crate::domain::repository::QuizRepository;
use crate::error::QuizResult;
use crate::presentation::dto::{
    QuestionsResponse, STARTED_MESSAGE, StartSessionResponse, SubmitRequest, SubmitResponse,
};

/// Shared state for quiz handlers
pub struct QuizAppState<R, V, C, L> {
    pub repo: Arc<R>,
    pub captcha: Arc<V>,
    pub crm: Arc<C>,
    pub limiter: Arc<DailyRateLimiter<L>>,
    pub tokens: Arc<SessionTokenCodec>,
    pub config: Arc<QuizConfig>,
}

// Manual impl: every field is an Arc, so no bounds on the parameters.
impl<R, V, C, L> Clone for QuizAppState<R, V, C, L> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            captcha: self.captcha.clone(),
            crm: self.crm.clone(),
            limiter: self.limiter.clone(),
            tokens: self.tokens.clone(),
            config: self.config.clone(),
        }
    }
}

/// POST /api/quiz/start
pub async fn start_session<R, V, C, L>(
    State(state): State<QuizAppState<R, V, C, L>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> QuizResult<Response>
where
    R: QuizRepository,
    V: CaptchaVerifier + Send + Sync + 'static,
    C: CrmSink + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let client = ClientContext::from_headers(&headers, Some(addr.ip()));

    let use_case = StartSessionUseCase::new(
        state.repo.clone(),
        state.limiter.clone(),
        state.tokens.clone(),
        state.config.clone(),
    );

    match use_case.execute(&client).await? {
        StartSessionOutput::Started { session_id, token } => {
            let body = Json(StartSessionResponse {
                message: STARTED_MESSAGE.to_string(),
                token: Some(token),
            });
            let cookie = state
                .config
                .cookie()
                .set_cookie_header(&session_id.to_string(), state.config.session_ttl);

            let mut response = (StatusCode::OK, body).into_response();
            if let Some(cookie) = cookie {
                response.headers_mut().insert(header::SET_COOKIE, cookie);
            }
            Ok(response)
        }
        StartSessionOutput::RateLimited => Ok((
            StatusCode::OK,
            Json(StartSessionResponse {
                message: STARTED_MESSAGE.to_string(),
                token: None,
            }),
        )
            .into_response()),
    }
}

/// POST /api/quiz/submit
///
/// The body is read raw so that malformed JSON flows through the pipeline
/// like any other incomplete submission.
pub async fn submit_quiz<R, V, C, L>(
    State(state): State<QuizAppState<R, V, C, L>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> QuizResult<Response>
where
    R: QuizRepository,
    V: CaptchaVerifier + Send + Sync + 'static,
    C: CrmSink + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let input = SubmitQuizInput {
        bearer_token: extract_bearer_token(&headers),
        client: ClientContext::from_headers(&headers, Some(addr.ip())),
        body: SubmitRequest::from_body(&body).into_submission(),
    };

    let use_case = SubmitQuizUseCase::new(
        state.repo.clone(),
        state.captcha.clone(),
        state.crm.clone(),
        state.limiter.clone(),
        state.tokens.clone(),
        state.config.clone(),
    );

    let admission = use_case.execute(input).await?;

    Ok(render_admission(&admission))
}

/// One response for every admission outcome
pub fn render_admission(_admission: &Admission) -> Response {
    (StatusCode::OK, Json(SubmitResponse::submitted())).into_response()
}

/// GET /api/quiz/questions
pub async fn list_questions<R, V, C, L>(
    State(state): State<QuizAppState<R, V, C, L>>,
    headers: HeaderMap,
) -> QuizResult<Json<QuestionsResponse>>
where
    R: QuizRepository,
    V: CaptchaVerifier + Send + Sync + 'static,
    C: CrmSink + Send + Sync + 'static,
    L: RateLimitStore + Send + Sync + 'static,
{
    let cookie = extract_cookie(&headers, &state.config.session_cookie_name);

    let use_case = ListQuestionsUseCase::new(state.repo.clone());
    let questions = use_case.execute(cookie.as_deref()).await?;

    Ok(Json(QuestionsResponse {
        questions: questions.into_iter().map(Into::into).collect(),
    }))
}
