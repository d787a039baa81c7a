// src/services/accounts.rs
//! Credential store: users, OAuth links, websites and social links.
//!
//! Multi-row writes (account creation, relinking, link ordering) run inside a
//! single transaction so a failure part way never leaves half an account.

use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::auth::models::{OAuthLink, User};
use crate::common::{
    generate_link_id, generate_oauth_link_id, generate_user_id, generate_website_id, ApiError,
};
use crate::website::models::{
    NewWebsite, SocialLink, UpdateWebsiteRequest, Website, DEFAULT_THEME, MAX_LINKS_PER_WEBSITE,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} is already taken")]
    Conflict(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("link order must list every link exactly once")]
    InvalidOrder,

    #[error("a website can have at most {0} links")]
    LimitReached(i64),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let unique_violation = e
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);

        if !unique_violation {
            return StoreError::Database(e);
        }

        let message = e.to_string();
        if message.contains("users.email") {
            StoreError::Conflict("email")
        } else if message.contains("users.username") {
            StoreError::Conflict("username")
        } else if message.contains("oauth_links") {
            StoreError::Conflict("oauth account")
        } else {
            StoreError::Conflict("record")
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(what) => ApiError::Conflict(format!("{} is already taken", what)),
            StoreError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            StoreError::InvalidOrder => ApiError::ValidationError(
                "ids: link order must list every link exactly once".to_string(),
            ),
            StoreError::LimitReached(max) => {
                ApiError::BadRequest(format!("a website can have at most {} links", max))
            }
            StoreError::Database(e) => ApiError::DatabaseError(e),
        }
    }
}

/// Provider identity to record alongside a new user
#[derive(Debug, Clone)]
pub struct NewOAuthLink {
    pub provider: String,
    pub external_id: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub oauth: Option<NewOAuthLink>,
    pub website: NewWebsite,
}

#[derive(Debug, Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ---- Users ----

    pub async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Writes the user, its optional OAuth link and its website atomically.
    pub async fn create_account(&self, account: NewAccount) -> Result<(User, Website), StoreError> {
        let user_id = generate_user_id();
        let website_id = generate_website_id();
        let provider = account.oauth.as_ref().map(|o| o.provider.clone());

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, provider) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user_id)
        .bind(account.email.trim())
        .bind(&account.username)
        .bind(account.password_hash.as_deref())
        .bind(provider.as_deref())
        .execute(&mut *tx)
        .await?;

        if let Some(oauth) = &account.oauth {
            insert_oauth_link(&mut *tx, oauth, &user_id).await?;
        }

        sqlx::query(
            "INSERT INTO websites (id, user_id, display_name, avatar_url, theme) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&website_id)
        .bind(&user_id)
        .bind(account.website.display_name.as_deref())
        .bind(account.website.avatar_url.as_deref())
        .bind(DEFAULT_THEME)
        .execute(&mut *tx)
        .await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(&mut *tx)
            .await?;
        let website = sqlx::query_as::<_, Website>("SELECT * FROM websites WHERE id = ?")
            .bind(&website_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(
            user_id = %user.id,
            website_id = %website.id,
            provider = ?provider,
            "Account created"
        );

        Ok((user, website))
    }

    // ---- OAuth links ----

    pub async fn find_oauth_link(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<OAuthLink>, StoreError> {
        Ok(sqlx::query_as::<_, OAuthLink>(
            "SELECT * FROM oauth_links WHERE provider = ? AND external_id = ?",
        )
        .bind(provider)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Points (provider, external_id) at `user_id`, creating the link if
    /// needed, and records the provider on the user.
    pub async fn link_oauth(
        &self,
        link: &NewOAuthLink,
        user_id: &str,
    ) -> Result<OAuthLink, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO oauth_links (id, provider, external_id, email, user_id)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(provider, external_id) DO UPDATE SET
                user_id = excluded.user_id,
                email = excluded.email
            "#,
        )
        .bind(generate_oauth_link_id())
        .bind(&link.provider)
        .bind(&link.external_id)
        .bind(&link.email)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query("UPDATE users SET provider = ? WHERE id = ?")
            .bind(&link.provider)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }

        let row = sqlx::query_as::<_, OAuthLink>(
            "SELECT * FROM oauth_links WHERE provider = ? AND external_id = ?",
        )
        .bind(&link.provider)
        .bind(&link.external_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            user_id = %user_id,
            provider = %link.provider,
            "OAuth identity linked to account"
        );

        Ok(row)
    }

    // ---- Websites ----

    pub async fn find_website_by_user(&self, user_id: &str) -> Result<Option<Website>, StoreError> {
        Ok(sqlx::query_as::<_, Website>("SELECT * FROM websites WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn website_for_user(&self, user_id: &str) -> Result<Website, StoreError> {
        self.find_website_by_user(user_id)
            .await?
            .ok_or(StoreError::NotFound("website"))
    }

    /// Applies the provided fields; absent fields are left unchanged.
    pub async fn update_website(
        &self,
        user_id: &str,
        update: &UpdateWebsiteRequest,
    ) -> Result<Website, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE websites SET
                display_name = COALESCE(?, display_name),
                bio = COALESCE(?, bio),
                avatar_url = COALESCE(?, avatar_url),
                theme = COALESCE(?, theme),
                updated_at = datetime('now')
            WHERE user_id = ?
            "#,
        )
        .bind(update.display_name.as_deref())
        .bind(update.bio.as_deref())
        .bind(update.avatar_url.as_deref())
        .bind(update.theme.as_deref())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("website"));
        }

        self.website_for_user(user_id).await
    }

    pub async fn set_website_avatar(&self, user_id: &str, avatar_url: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE websites SET avatar_url = ?, updated_at = datetime('now') WHERE user_id = ?",
        )
        .bind(avatar_url)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- Social links ----

    pub async fn list_links(&self, website_id: &str) -> Result<Vec<SocialLink>, StoreError> {
        Ok(fetch_links(&self.pool, website_id).await?)
    }

    /// Appends a link after the current last one.
    ///
    /// The limit check and the insert are one statement, so concurrent
    /// creates never push a website past `MAX_LINKS_PER_WEBSITE`.
    pub async fn create_link(
        &self,
        website_id: &str,
        title: &str,
        url: &str,
    ) -> Result<SocialLink, StoreError> {
        let id = generate_link_id();
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO social_links (id, website_id, title, url, position)
            SELECT ?, ?, ?, ?, (
                SELECT COALESCE(MAX(position) + 1, 0) FROM social_links WHERE website_id = ?
            )
            WHERE (SELECT COUNT(*) FROM social_links WHERE website_id = ?) < ?
            "#,
        )
        .bind(&id)
        .bind(website_id)
        .bind(title)
        .bind(url)
        .bind(website_id)
        .bind(website_id)
        .bind(MAX_LINKS_PER_WEBSITE)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            debug!(website_id = %website_id, "Link limit reached");
            return Err(StoreError::LimitReached(MAX_LINKS_PER_WEBSITE));
        }

        let link = sqlx::query_as::<_, SocialLink>("SELECT * FROM social_links WHERE id = ?")
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(link)
    }

    pub async fn update_link(
        &self,
        website_id: &str,
        link_id: &str,
        title: Option<&str>,
        url: Option<&str>,
    ) -> Result<SocialLink, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE social_links SET
                title = COALESCE(?, title),
                url = COALESCE(?, url)
            WHERE id = ? AND website_id = ?
            "#,
        )
        .bind(title)
        .bind(url)
        .bind(link_id)
        .bind(website_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("link"));
        }

        Ok(
            sqlx::query_as::<_, SocialLink>("SELECT * FROM social_links WHERE id = ?")
                .bind(link_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    /// Removes a link and closes the gap in the ordering.
    pub async fn delete_link(&self, website_id: &str, link_id: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM social_links WHERE id = ? AND website_id = ?")
            .bind(link_id)
            .bind(website_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("link"));
        }

        let remaining = fetch_links(&mut *tx, website_id).await?;
        let ids: Vec<String> = remaining.into_iter().map(|l| l.id).collect();
        write_positions(&mut *tx, website_id, &ids).await?;

        tx.commit().await?;
        Ok(())
    }

    /// `ids` must be a permutation of the website's link ids.
    pub async fn reorder_links(
        &self,
        website_id: &str,
        ids: &[String],
    ) -> Result<Vec<SocialLink>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: HashSet<String> = fetch_links(&mut *tx, website_id)
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();
        let requested: HashSet<String> = ids.iter().cloned().collect();

        if requested.len() != ids.len() || requested != current {
            debug!(
                website_id = %website_id,
                requested = ids.len(),
                existing = current.len(),
                "Rejected link reorder"
            );
            return Err(StoreError::InvalidOrder);
        }

        write_positions(&mut *tx, website_id, ids).await?;
        let links = fetch_links(&mut *tx, website_id).await?;

        tx.commit().await?;
        Ok(links)
    }
}

async fn insert_oauth_link(
    conn: &mut SqliteConnection,
    link: &NewOAuthLink,
    user_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO oauth_links (id, provider, external_id, email, user_id) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(generate_oauth_link_id())
    .bind(&link.provider)
    .bind(&link.external_id)
    .bind(&link.email)
    .bind(user_id)
    .execute(conn)
    .await
    .map_err(|e| {
        error!(error = %e, provider = %link.provider, "Failed to insert OAuth link");
        e
    })?;
    Ok(())
}

async fn fetch_links<'e, E>(executor: E, website_id: &str) -> Result<Vec<SocialLink>, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query_as::<_, SocialLink>(
        "SELECT * FROM social_links WHERE website_id = ? ORDER BY position ASC, created_at ASC",
    )
    .bind(website_id)
    .fetch_all(executor)
    .await
}

async fn write_positions(
    conn: &mut SqliteConnection,
    website_id: &str,
    ids: &[String],
) -> Result<(), sqlx::Error> {
    for (position, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE social_links SET position = ? WHERE id = ? AND website_id = ?")
            .bind(position as i64)
            .bind(id)
            .bind(website_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
