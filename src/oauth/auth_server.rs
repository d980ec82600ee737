//! Core chained OAuth 2.1 authorization server.
//!
//! One parameterized broker covers both deployment shapes: identity-only
//! (no downstream provider configured) and chained (identity hop, then a
//! second consent against the downstream provider for users without a
//! stored delegated credential). "Token already stored" and "no downstream
//! configured" share the issue-code-and-redirect path.

use crate::config::{Config, ProviderConfig};
use crate::errors::OAuthError;
use crate::oauth::jwt::{self, Claims, TokenUse};
use crate::oauth::pkce;
use crate::oauth::types::*;
use crate::storage::traits::{
    AuthorizationCodeStore, BrokerStorage, ClientStore, PendingFlowStore, ServiceToken,
    ServiceTokenStore,
};
use chrono::Utc;
use std::sync::Arc;
use url::Url;

/// Chained OAuth 2.1 authorization server
pub struct AuthorizationServer {
    storage: Arc<dyn BrokerStorage>,
    service_tokens: Arc<dyn ServiceTokenStore>,
    http_client: reqwest::Client,
    config: Arc<Config>,
}

impl AuthorizationServer {
    pub fn new(
        storage: Arc<dyn BrokerStorage>,
        service_tokens: Arc<dyn ServiceTokenStore>,
        http_client: reqwest::Client,
        config: Arc<Config>,
    ) -> Self {
        Self {
            storage,
            service_tokens,
            http_client,
            config,
        }
    }

    // ===== Dynamic Client Registration (RFC 7591) =====

    /// Register a new OAuth client.
    ///
    /// The secret is revealed only in this response. Registrations are
    /// ephemeral; clients re-register transparently after a restart.
    pub async fn register_client(
        &self,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuthError> {
        let redirect_uris = match request.redirect_uris {
            Some(uris) if !uris.is_empty() => uris,
            _ => {
                return Err(OAuthError::InvalidClientMetadata(
                    "redirect_uris required".to_string(),
                ));
            }
        };

        let client = ClientRegistration {
            client_id: generate_client_id(),
            client_secret: generate_client_secret(),
            client_name: request.client_name.clone(),
            redirect_uris: redirect_uris.clone(),
            created_at: Utc::now(),
        };

        self.storage
            .store_client(&client)
            .await
            .map_err(|e| OAuthError::ServerError(format!("Failed to store client: {e}")))?;

        tracing::info!(
            client_id = %client.client_id,
            client_name = %request.client_name.as_deref().unwrap_or("unnamed"),
            "registered client"
        );

        Ok(ClientRegistrationResponse {
            client_id: client.client_id,
            client_secret: client.client_secret,
            redirect_uris,
            client_name: request.client_name.unwrap_or_default(),
            token_endpoint_auth_method: "client_secret_post".to_string(),
        })
    }

    // ===== Authorization endpoint =====

    /// Validate an authorization request and build the identity provider
    /// redirect, parking the client's flow parameters under a fresh state.
    pub async fn authorize(&self, query: AuthorizeQuery) -> Result<String, OAuthError> {
        if query.response_type.as_deref() != Some("code") {
            return Err(OAuthError::UnsupportedResponseType(
                query.response_type.unwrap_or_default(),
            ));
        }

        let client_id = query.client_id.unwrap_or_default();
        let client = self
            .storage
            .get_client(&client_id)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?
            .ok_or_else(|| {
                OAuthError::InvalidClient("Unknown client_id - re-register".to_string())
            })?;

        // Exact match only: the open-redirect guard
        let redirect_uri = query.redirect_uri.unwrap_or_default();
        if !client.redirect_uris.contains(&redirect_uri) {
            return Err(OAuthError::InvalidRequest(
                "redirect_uri not registered".to_string(),
            ));
        }

        let code_challenge = match query.code_challenge {
            Some(ref challenge)
                if !challenge.is_empty()
                    && query.code_challenge_method.as_deref()
                        == Some(pkce::CHALLENGE_METHOD_S256) =>
            {
                challenge.clone()
            }
            _ => {
                return Err(OAuthError::InvalidRequest("PKCE S256 required".to_string()));
            }
        };

        let identity_state = generate_state();
        let flow = PendingIdentityFlow {
            client_id,
            redirect_uri,
            code_challenge,
            code_challenge_method: pkce::CHALLENGE_METHOD_S256.to_string(),
            original_state: query.state.unwrap_or_default(),
            scope: query
                .scope
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| self.config.oauth_scope.clone()),
            expires_at: Utc::now() + *self.config.pending_flow_ttl.as_ref(),
        };
        self.storage
            .store_identity_flow(&identity_state, &flow)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?;

        let provider = &self.config.identity_provider;
        let mut authorize_url = provider.authorize_url.clone();
        authorize_url
            .query_pairs_mut()
            .append_pair("client_id", &provider.client_id)
            .append_pair("redirect_uri", &self.config.identity_callback_uri())
            .append_pair("response_type", "code")
            .append_pair("scope", &provider.scopes)
            .append_pair("state", &identity_state);
        for (key, value) in &provider.extra_authorize_params {
            authorize_url.query_pairs_mut().append_pair(key, value);
        }

        Ok(authorize_url.to_string())
    }

    // ===== Identity provider callback =====

    /// Complete the identity hop: exchange the provider code, verify the
    /// email domain, then either chain to the downstream provider or issue
    /// a local authorization code straight away.
    pub async fn identity_callback(&self, query: CallbackQuery) -> Result<String, OAuthError> {
        if let Some(error) = query.error {
            return Err(OAuthError::InvalidRequest(format!(
                "Identity provider error: {error}"
            )));
        }

        let state = query.state.unwrap_or_default();
        let flow = self
            .storage
            .consume_identity_flow(&state)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?
            .ok_or(OAuthError::InvalidState)?;

        let code = query
            .code
            .ok_or_else(|| OAuthError::InvalidRequest("Missing code parameter".to_string()))?;

        let token_data = self
            .exchange_provider_code(
                &self.config.identity_provider,
                &code,
                &self.config.identity_callback_uri(),
            )
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "identity token exchange failed");
                OAuthError::UpstreamFailure(
                    "Failed to verify your identity. Please try again.".to_string(),
                )
            })?;

        let id_token = token_data.id_token.ok_or_else(|| {
            OAuthError::UpstreamFailure(
                "Identity provider did not return an ID token.".to_string(),
            )
        })?;

        // The assertion is accepted without independent signature
        // verification: it was obtained over a direct confidential
        // server-to-server exchange immediately after the code swap.
        let email = jwt::decode_unverified_payload(&id_token)
            .and_then(|payload| payload.get("email")?.as_str().map(str::to_string))
            .unwrap_or_default();

        if !self.config.allowed_email_domains.permits(&email) {
            tracing::warn!(%email, "rejected login from disallowed domain");
            return Err(OAuthError::AccessDenied(format!(
                "Only {} accounts are allowed.",
                self.config.allowed_email_domains.display_list()
            )));
        }

        tracing::info!(%email, "identity verified");

        if let Some(downstream) = &self.config.downstream_provider {
            if self.needs_downstream_consent(&email).await {
                tracing::info!(%email, "no stored downstream credential - redirecting to consent");
                return self.build_downstream_redirect(downstream, flow, email).await;
            }
            tracing::info!(%email, "existing downstream credential found - skipping consent");
        }

        self.issue_code_redirect(
            &flow.client_id,
            &flow.redirect_uri,
            &flow.code_challenge,
            &flow.code_challenge_method,
            &flow.original_state,
            &email,
        )
        .await
    }

    /// Whether the user still needs the downstream consent hop.
    ///
    /// A credential-store failure degrades to "needs re-consent" rather
    /// than failing the whole login.
    async fn needs_downstream_consent(&self, email: &str) -> bool {
        let stored = self
            .service_tokens
            .get_token(email, &self.config.downstream_service)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "service token lookup failed; treating as absent");
                None
            });
        !matches!(stored, Some(token) if !token.access_token.is_empty())
    }

    async fn build_downstream_redirect(
        &self,
        provider: &ProviderConfig,
        flow: PendingIdentityFlow,
        email: String,
    ) -> Result<String, OAuthError> {
        let downstream_state = generate_state();
        let downstream_flow = PendingDownstreamFlow {
            client_id: flow.client_id,
            redirect_uri: flow.redirect_uri,
            code_challenge: flow.code_challenge,
            code_challenge_method: flow.code_challenge_method,
            original_state: flow.original_state,
            scope: flow.scope,
            email,
            expires_at: Utc::now() + *self.config.pending_flow_ttl.as_ref(),
        };
        self.storage
            .store_downstream_flow(&downstream_state, &downstream_flow)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?;

        let mut consent_url = provider.authorize_url.clone();
        consent_url
            .query_pairs_mut()
            .append_pair("client_id", &provider.client_id)
            .append_pair("redirect_uri", &self.config.downstream_callback_uri())
            .append_pair("response_type", "code")
            .append_pair("scope", &provider.scopes)
            .append_pair("state", &downstream_state);
        for (key, value) in &provider.extra_authorize_params {
            consent_url.query_pairs_mut().append_pair(key, value);
        }

        Ok(consent_url.to_string())
    }

    // ===== Downstream provider callback =====

    /// Complete the downstream hop: exchange the consent code, persist the
    /// delegated credential, and resume the original client flow.
    pub async fn downstream_callback(&self, query: CallbackQuery) -> Result<String, OAuthError> {
        let provider = self.config.downstream_provider.as_ref().ok_or_else(|| {
            OAuthError::InvalidRequest("No downstream provider configured".to_string())
        })?;

        if let Some(error) = query.error {
            return Err(OAuthError::InvalidRequest(format!(
                "Downstream provider error: {error}"
            )));
        }

        let state = query.state.unwrap_or_default();
        let flow = self
            .storage
            .consume_downstream_flow(&state)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?
            .ok_or(OAuthError::InvalidState)?;

        let code = query
            .code
            .ok_or_else(|| OAuthError::InvalidRequest("Missing code parameter".to_string()))?;

        let token_data = self
            .exchange_provider_code(provider, &code, &self.config.downstream_callback_uri())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "downstream token exchange failed");
                OAuthError::UpstreamFailure(
                    "Failed to connect your account. Please try again.".to_string(),
                )
            })?;

        let access_token = token_data.access_token.unwrap_or_default();
        if access_token.is_empty() {
            return Err(OAuthError::UpstreamFailure(
                "Downstream provider did not return an access token.".to_string(),
            ));
        }

        // expires_in comes from an external party; an unrepresentable value
        // falls back to the one-hour default instead of wrapping negative
        let expires_in = token_data
            .expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .unwrap_or(3600);
        let service_token = ServiceToken {
            access_token,
            refresh_token: token_data.refresh_token.unwrap_or_default(),
            expires_at: Utc::now().timestamp() + expires_in,
            updated_at: Utc::now().timestamp_millis(),
        };
        self.service_tokens
            .save_token(&flow.email, &self.config.downstream_service, service_token)
            .await
            .map_err(|e| OAuthError::ServerError(format!("Failed to persist credential: {e}")))?;

        tracing::info!(email = %flow.email, service = %self.config.downstream_service, "downstream credential stored");

        self.issue_code_redirect(
            &flow.client_id,
            &flow.redirect_uri,
            &flow.code_challenge,
            &flow.code_challenge_method,
            &flow.original_state,
            &flow.email,
        )
        .await
    }

    /// Mint a local authorization code and build the client redirect.
    async fn issue_code_redirect(
        &self,
        client_id: &str,
        redirect_uri: &str,
        code_challenge: &str,
        code_challenge_method: &str,
        original_state: &str,
        email: &str,
    ) -> Result<String, OAuthError> {
        let code = generate_code();
        let auth_code = AuthorizationCode {
            code: code.clone(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            code_challenge: code_challenge.to_string(),
            code_challenge_method: code_challenge_method.to_string(),
            email: email.to_string(),
            expires_at: Utc::now() + *self.config.auth_code_ttl.as_ref(),
        };
        self.storage
            .store_code(&auth_code)
            .await
            .map_err(|e| OAuthError::ServerError(format!("Failed to store auth code: {e}")))?;

        let mut callback_url = Url::parse(redirect_uri)
            .map_err(|e| OAuthError::ServerError(format!("Invalid redirect URI: {e}")))?;
        callback_url.query_pairs_mut().append_pair("code", &code);
        if !original_state.is_empty() {
            callback_url
                .query_pairs_mut()
                .append_pair("state", original_state);
        }
        Ok(callback_url.to_string())
    }

    /// Exchange an authorization code at an external provider's token
    /// endpoint. Bounded by the shared HTTP client timeout; never retried.
    async fn exchange_provider_code(
        &self,
        provider: &ProviderConfig,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderTokenResponse, OAuthError> {
        let response = self
            .http_client
            .post(provider.token_url.clone())
            .form(&[
                ("code", code),
                ("client_id", provider.client_id.as_str()),
                ("client_secret", provider.client_secret.as_str()),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::UpstreamFailure(format!("token endpoint unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::UpstreamFailure(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<ProviderTokenResponse>()
            .await
            .map_err(|e| OAuthError::UpstreamFailure(format!("malformed token response: {e}")))
    }

    // ===== Token endpoint =====

    /// Handle token requests, dispatching on grant_type.
    pub async fn token(&self, form: TokenForm) -> Result<TokenResponse, OAuthError> {
        match form.grant_type.as_str() {
            "authorization_code" => self.handle_authorization_code_grant(form).await,
            "refresh_token" => self.handle_refresh_token_grant(form).await,
            other => Err(OAuthError::UnsupportedGrantType(other.to_string())),
        }
    }

    async fn handle_authorization_code_grant(
        &self,
        form: TokenForm,
    ) -> Result<TokenResponse, OAuthError> {
        let code = form
            .code
            .ok_or_else(|| OAuthError::InvalidRequest("Missing authorization code".to_string()))?;

        // Single use: the store deletes the code with the read, so a
        // concurrent or repeated redemption sees "not found".
        let auth_code = self
            .storage
            .consume_code(&code)
            .await
            .map_err(|e| OAuthError::ServerError(e.to_string()))?
            .ok_or_else(|| {
                OAuthError::InvalidGrant("Invalid or expired authorization code".to_string())
            })?;

        if Utc::now() > auth_code.expires_at {
            return Err(OAuthError::InvalidGrant(
                "Authorization code expired".to_string(),
            ));
        }

        // A wrong client_id is a grant-binding failure (400); only a wrong
        // secret below is a credential failure (401)
        if let Some(ref client_id) = form.client_id {
            if *client_id != auth_code.client_id {
                return Err(OAuthError::InvalidGrant("client_id mismatch".to_string()));
            }
        }

        if let Some(ref redirect_uri) = form.redirect_uri {
            if *redirect_uri != auth_code.redirect_uri {
                return Err(OAuthError::InvalidGrant("redirect_uri mismatch".to_string()));
            }
        }

        let verifier_ok = form
            .code_verifier
            .as_deref()
            .is_some_and(|verifier| pkce::verify_s256(verifier, &auth_code.code_challenge));
        if !verifier_ok {
            return Err(OAuthError::InvalidGrant(
                "PKCE verification failed".to_string(),
            ));
        }

        if let Some(ref client_secret) = form.client_secret {
            let client = self
                .storage
                .get_client(&auth_code.client_id)
                .await
                .map_err(|e| OAuthError::ServerError(e.to_string()))?;
            if let Some(client) = client {
                if client.client_secret != *client_secret {
                    return Err(OAuthError::InvalidClient(
                        "Invalid client secret".to_string(),
                    ));
                }
            }
        }

        let now = Utc::now().timestamp();
        let access_ttl = self.config.access_token_ttl.as_ref().num_seconds();
        let refresh_ttl = self.config.refresh_token_ttl.as_ref().num_seconds();

        let access_token = jwt::sign(
            &Claims {
                sub: auth_code.email.clone(),
                iss: self.config.external_base.clone(),
                iat: now,
                exp: now + access_ttl,
                scope: self.config.oauth_scope.clone(),
                token_use: TokenUse::Access,
            },
            &self.config.jwt_secret,
        )?;

        let refresh_token = jwt::sign(
            &Claims {
                sub: auth_code.email,
                iss: self.config.external_base.clone(),
                iat: now,
                exp: now + refresh_ttl,
                scope: self.config.oauth_scope.clone(),
                token_use: TokenUse::Refresh,
            },
            &self.config.jwt_secret,
        )?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: access_ttl as u64,
            refresh_token: Some(refresh_token),
            scope: self.config.oauth_scope.clone(),
        })
    }

    async fn handle_refresh_token_grant(
        &self,
        form: TokenForm,
    ) -> Result<TokenResponse, OAuthError> {
        let refresh_token = form
            .refresh_token
            .ok_or_else(|| OAuthError::InvalidRequest("Missing refresh token".to_string()))?;

        let claims = jwt::verify(&refresh_token, &self.config.jwt_secret)
            .filter(|claims| claims.token_use == TokenUse::Refresh)
            .ok_or_else(|| {
                OAuthError::InvalidGrant("Invalid or expired refresh token".to_string())
            })?;

        let now = Utc::now().timestamp();
        let access_ttl = self.config.access_token_ttl.as_ref().num_seconds();

        let access_token = jwt::sign(
            &Claims {
                sub: claims.sub,
                iss: self.config.external_base.clone(),
                iat: now,
                exp: now + access_ttl,
                scope: self.config.oauth_scope.clone(),
                token_use: TokenUse::Access,
            },
            &self.config.jwt_secret,
        )?;

        // No refresh token rotation: the submitted one stays valid
        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: access_ttl as u64,
            refresh_token: None,
            scope: self.config.oauth_scope.clone(),
        })
    }

    // ===== Bearer verification =====

    /// Verify a presented bearer token. Only access tokens pass.
    pub fn verify_access_token(&self, token: &str) -> Option<Claims> {
        jwt::verify(token, &self.config.jwt_secret)
            .filter(|claims| claims.token_use == TokenUse::Access)
    }
}
