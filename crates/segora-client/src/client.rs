use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use segora_types::api::{
    AuthResponse, CreateListingRequest, CreateReportRequest, CreateTransactionRequest, ErrorBody,
    FavoriteState, ImageUploadResponse, ListingPage, LoginRequest, MarkReadResponse,
    OpenConversationResponse, RegisterRequest, SellerPage, SendMessageRequest, SessionUser,
    SetupShopRequest, UpdateListingRequest, UpdateProfileRequest,
};
use segora_types::filters::ListingFilters;
use segora_types::models::{
    Category, Conversation, Favorite, Listing, Message, Report, Transaction, UserProfile,
};

use crate::error::ClientError;
use crate::favorites::FavoriteStore;
use crate::feed::ListingSource;
use crate::matcher::ConversationStore;

/// The signed-in user as far as the client knows.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

/// HTTP client for the marketplace service.
pub struct MarketClient {
    http: Client,
    base_url: String,
    session: RwLock<Option<Session>>,
}

impl MarketClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session: RwLock::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_user(&self) -> Option<Uuid> {
        self.session().map(|s| s.user_id)
    }

    fn set_session(&self, session: Option<Session>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    // -- Auth --

    pub async fn register(&self, req: &RegisterRequest) -> Result<Session, ClientError> {
        let auth: AuthResponse = self
            .send(self.request(Method::POST, "/auth/register").json(req))
            .await?;
        Ok(self.start_session(auth))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self
            .send(self.request(Method::POST, "/auth/login").json(&req))
            .await?;
        Ok(self.start_session(auth))
    }

    pub fn logout(&self) {
        self.set_session(None);
    }

    fn start_session(&self, auth: AuthResponse) -> Session {
        let session = Session {
            user_id: auth.user_id,
            email: auth.email,
            token: auth.token,
        };
        debug!("Signed in as {}", session.user_id);
        self.set_session(Some(session.clone()));
        session
    }

    pub async fn session_user(&self) -> Result<SessionUser, ClientError> {
        self.send(self.authed(Method::GET, "/auth/session")?).await
    }

    // -- Listings --

    pub async fn categories(&self) -> Result<Vec<Category>, ClientError> {
        self.send(self.request(Method::GET, "/categories")).await
    }

    pub async fn listings(&self, filters: &ListingFilters) -> Result<ListingPage, ClientError> {
        self.send(self.request(Method::GET, "/listings").query(filters))
            .await
    }

    pub async fn recommendations(&self) -> Result<Vec<Listing>, ClientError> {
        self.send(self.request(Method::GET, "/listings/recommendations"))
            .await
    }

    pub async fn listing(&self, id: Uuid) -> Result<Listing, ClientError> {
        self.send(self.request(Method::GET, &format!("/listings/{}", id)))
            .await
    }

    pub async fn create_listing(&self, req: &CreateListingRequest) -> Result<Listing, ClientError> {
        self.send(self.authed(Method::POST, "/listings")?.json(req))
            .await
    }

    pub async fn update_listing(
        &self,
        id: Uuid,
        req: &UpdateListingRequest,
    ) -> Result<Listing, ClientError> {
        self.send(self.authed(Method::PUT, &format!("/listings/{}", id))?.json(req))
            .await
    }

    pub async fn delete_listing(&self, id: Uuid) -> Result<(), ClientError> {
        self.send_empty(self.authed(Method::DELETE, &format!("/listings/{}", id))?)
            .await
    }

    pub async fn seller_page(&self, seller_id: Uuid) -> Result<SellerPage, ClientError> {
        self.send(self.request(Method::GET, &format!("/sellers/{}", seller_id)))
            .await
    }

    pub async fn dashboard(&self) -> Result<ListingPage, ClientError> {
        self.send(self.authed(Method::GET, "/dashboard/listings")?)
            .await
    }

    // -- Conversations --

    pub async fn open_conversation(
        &self,
        listing_id: Uuid,
    ) -> Result<OpenConversationResponse, ClientError> {
        self.send(self.authed(Method::POST, &format!("/listings/{}/conversation", listing_id))?)
            .await
    }

    pub async fn chats(&self) -> Result<Vec<Conversation>, ClientError> {
        self.send(self.authed(Method::GET, "/chats")?).await
    }

    pub async fn messages(&self, chat_id: Uuid) -> Result<Vec<Message>, ClientError> {
        self.send(self.authed(Method::GET, &format!("/chats/{}/messages", chat_id))?)
            .await
    }

    pub async fn send_message(&self, chat_id: Uuid, content: &str) -> Result<Message, ClientError> {
        let req = SendMessageRequest {
            content: content.to_string(),
        };
        self.send(
            self.authed(Method::POST, &format!("/chats/{}/messages", chat_id))?
                .json(&req),
        )
        .await
    }

    pub async fn mark_read(&self, chat_id: Uuid) -> Result<usize, ClientError> {
        let res: MarkReadResponse = self
            .send(self.authed(Method::POST, &format!("/chats/{}/read", chat_id))?)
            .await?;
        Ok(res.updated)
    }

    // -- Favorites --

    pub async fn favorites(&self) -> Result<Vec<Favorite>, ClientError> {
        self.send(self.authed(Method::GET, "/favorites")?).await
    }

    pub async fn set_favorite(&self, listing_id: Uuid, on: bool) -> Result<FavoriteState, ClientError> {
        let method = if on { Method::PUT } else { Method::DELETE };
        self.send(self.authed(method, &format!("/favorites/{}", listing_id))?)
            .await
    }

    // -- Profiles --

    pub async fn profile(&self) -> Result<UserProfile, ClientError> {
        self.send(self.authed(Method::GET, "/profile")?).await
    }

    pub async fn public_profile(&self, user_id: Uuid) -> Result<UserProfile, ClientError> {
        self.send(self.request(Method::GET, &format!("/profiles/{}", user_id)))
            .await
    }

    pub async fn update_profile(&self, req: &UpdateProfileRequest) -> Result<UserProfile, ClientError> {
        self.send(self.authed(Method::PUT, "/profile")?.json(req))
            .await
    }

    pub async fn setup_shop(&self, req: &SetupShopRequest) -> Result<UserProfile, ClientError> {
        self.send(self.authed(Method::POST, "/profile/shop")?.json(req))
            .await
    }

    // -- Transactions, reports, images --

    pub async fn buy(&self, item_id: Uuid) -> Result<Transaction, ClientError> {
        let req = CreateTransactionRequest { item_id };
        self.send(self.authed(Method::POST, "/transactions")?.json(&req))
            .await
    }

    pub async fn purchases(&self) -> Result<Vec<Transaction>, ClientError> {
        self.send(self.authed(Method::GET, "/purchases")?).await
    }

    pub async fn report(&self, listing_id: Uuid, req: &CreateReportRequest) -> Result<Report, ClientError> {
        self.send(
            self.authed(Method::POST, &format!("/listings/{}/reports", listing_id))?
                .json(req),
        )
        .await
    }

    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ImageUploadResponse, ClientError> {
        self.send(
            self.authed(Method::POST, "/images")?
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes),
        )
        .await
    }

    // -- Plumbing --

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.session() {
            Some(session) => builder.bearer_auth(session.token),
            None => builder,
        }
    }

    /// Like [`Self::request`], but fails fast without a session.
    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        if self.session().is_none() {
            return Err(ClientError::LoginRequired);
        }
        Ok(self.request(method, path))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = check(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        check(builder.send().await?).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into a [`ClientError`] carrying the service's message.
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error.message,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };
    Err(ClientError::from_status(status.as_u16(), message))
}

#[async_trait]
impl ConversationStore for MarketClient {
    async fn open_conversation(
        &self,
        listing_id: Uuid,
    ) -> Result<OpenConversationResponse, ClientError> {
        MarketClient::open_conversation(self, listing_id).await
    }
}

#[async_trait]
impl ListingSource for MarketClient {
    async fn fetch_listings(&self, filters: &ListingFilters) -> Result<Vec<Listing>, ClientError> {
        Ok(self.listings(filters).await?.items)
    }
}

#[async_trait]
impl FavoriteStore for MarketClient {
    async fn add_favorite(&self, listing_id: Uuid) -> Result<(), ClientError> {
        self.set_favorite(listing_id, true).await.map(|_| ())
    }

    async fn remove_favorite(&self, listing_id: Uuid) -> Result<(), ClientError> {
        self.set_favorite(listing_id, false).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = MarketClient::new("http://localhost:3000/");
        assert_eq!(client.base_url(), "http://localhost:3000");
    }

    #[test]
    fn authed_requests_need_a_session() {
        let client = MarketClient::new("http://localhost:3000");
        assert!(matches!(
            client.authed(Method::GET, "/profile"),
            Err(ClientError::LoginRequired)
        ));

        client.set_session(Some(Session {
            user_id: Uuid::new_v4(),
            email: "budi@kampus.ac.id".into(),
            token: "token".into(),
        }));
        let req = client.authed(Method::GET, "/profile").unwrap().build().unwrap();
        assert_eq!(req.url().as_str(), "http://localhost:3000/profile");
        assert_eq!(
            req.headers()[reqwest::header::AUTHORIZATION].to_str().unwrap(),
            "Bearer token"
        );

        client.logout();
        assert!(client.current_user().is_none());
    }

    #[test]
    fn filters_encode_as_query_parameters() {
        let client = MarketClient::new("http://localhost:3000");
        let filters = ListingFilters {
            search: Some("kalkulator".into()),
            max_price: Some(50_000),
            sort: segora_types::filters::SortOrder::PriceAsc,
            ..Default::default()
        };
        let req = client
            .request(Method::GET, "/listings")
            .query(&filters)
            .build()
            .unwrap();
        assert_eq!(
            req.url().query(),
            Some("search=kalkulator&max_price=50000&sort=price_asc")
        );
    }
}
