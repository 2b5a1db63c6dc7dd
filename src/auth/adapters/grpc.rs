use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::error;

use crate::auth::domain::AuthError;
use crate::auth::ports::AuthenticationPort;
use crate::generated::auth::auth_server::Auth;
use crate::generated::auth::{
    IsAdminRequest, IsAdminResponse, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse,
};

pub struct GrpcAuthService<T: AuthenticationPort> {
    auth_service: Arc<T>,
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        match err {
            // 呼び出し側には理由を区別させない
            AuthError::InvalidCredentials => Status::invalid_argument("invalid email or password"),
            AuthError::UserAlreadyExists => Status::already_exists("user already exists"),
            AuthError::UserNotFound => Status::not_found("user not found"),
            AuthError::AppNotFound => Status::not_found("app not found"),
            AuthError::ConfigError(_) | AuthError::InternalError(_) => {
                error!("internal error: {:?}", err);
                Status::internal("internal server error")
            }
        }
    }
}

/// リクエスト単位の入力検証。共有状態は持たない
pub mod validate {
    use tonic::Status;

    pub fn email(value: &str) -> Result<(), Status> {
        if value.is_empty() {
            return Err(Status::invalid_argument("email is required"));
        }
        if !email_address::EmailAddress::is_valid(value) {
            return Err(Status::invalid_argument("email is not a valid address"));
        }
        Ok(())
    }

    pub fn password(value: &str) -> Result<(), Status> {
        if value.is_empty() {
            return Err(Status::invalid_argument("password is required"));
        }
        Ok(())
    }

    pub fn app_id(value: i32) -> Result<(), Status> {
        if value <= 0 {
            return Err(Status::invalid_argument("app_id is required"));
        }
        Ok(())
    }

    pub fn user_id(value: i64) -> Result<(), Status> {
        if value <= 0 {
            return Err(Status::invalid_argument("user_id is required"));
        }
        Ok(())
    }

    pub fn credentials(email: &str, password: &str, app_id: i32) -> Result<(), Status> {
        self::email(email)?;
        self::password(password)?;
        self::app_id(app_id)
    }
}

impl<T: AuthenticationPort> GrpcAuthService<T> {
    pub fn new(auth_service: Arc<T>) -> Self {
        Self { auth_service }
    }
}

#[tonic::async_trait]
impl<T: AuthenticationPort + Send + Sync + 'static> Auth for GrpcAuthService<T> {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let req = request.into_inner();
        validate::credentials(&req.email, &req.password, req.app_id)?;

        let user_id = self
            .auth_service
            .register(&req.email, &req.password, req.app_id)
            .await
            .map_err(Status::from)?;

        Ok(Response::new(RegisterResponse { user_id }))
    }

    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        validate::credentials(&req.email, &req.password, req.app_id)?;

        let token = self
            .auth_service
            .login(&req.email, &req.password, req.app_id)
            .await
            .map_err(Status::from)?;

        Ok(Response::new(LoginResponse { token }))
    }

    async fn is_admin(
        &self,
        request: Request<IsAdminRequest>,
    ) -> Result<Response<IsAdminResponse>, Status> {
        let req = request.into_inner();
        validate::user_id(req.user_id)?;

        let is_admin = self
            .auth_service
            .is_admin(req.user_id)
            .await
            .map_err(Status::from)?;

        Ok(Response::new(IsAdminResponse { is_admin }))
    }
}
