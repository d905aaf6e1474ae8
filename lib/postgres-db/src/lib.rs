use std::future::Future;

use anyhow::{bail, Context, Result};
use thiserror::Error;

use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{query, Executor, PgPool, Row};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use courier_messenger::data_access::DataAccess;
use courier_messenger::profile::{OrganizationInfo, PersonInfo, UnknownRole};
use courier_messenger::{AdminProfile, Message, Profile, Role, Room, RoomId, User, UserId};

pub const MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
pub const DB_VERSION: i64 = 2;

const USER_COLUMNS: &str = "id, email, role, full_name, profile_image, organization_name, logo_image";
const ROOM_COLUMNS: &str = "id, sender_id, receiver_id, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, room_id, sender_id, receiver_id, message, images, is_read, created_at";

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn new(connection_string: &str) -> Result<Self> {
        let options: PgConnectOptions = connection_string.parse()?;
        let pool = PgPool::connect_with(options).await?;

        Ok(Db { pool })
    }

    pub fn graceful_shutdown(&self, cancellation_token: CancellationToken) -> impl Future<Output = Result<(), JoinError>> {
        let pool_cloned = self.pool.clone();
        tokio::spawn(async move {
            cancellation_token.cancelled().await;
            tracing::info!("Shutting down database connection...");
            pool_cloned.close().await;
            tracing::info!("Shutting down database connection...Success");
        })
    }

    pub async fn check_migrations(&self) -> Result<()> {
        let migrations_table_exists: bool = self.pool
            .acquire().await?
            .fetch_one(query("select exists (select from pg_tables where (schemaname = 'public') and (tablename = '_sqlx_migrations'))"))
            .await?
            .try_get(0)?;

        if !migrations_table_exists {
            bail!("Database uninitialized. Please migrate database using the 'migrate' tool");
        }

        let latest_version: i64 = match self.pool
            .acquire().await?
            .fetch_optional(query("select version from _sqlx_migrations order by version desc limit 1"))
            .await?
        {
            Some(row) => row.try_get(0)?,
            None => -1,
        };

        if latest_version < DB_VERSION {
            bail!("Database schema not up to date. Please migrate database using the 'migrate' tool")
        } else if latest_version > DB_VERSION {
            bail!("Application not up to date with the database. Please use a newer version of the app or undo database migrations until version {}", DB_VERSION)
        };

        Ok(())
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.context("Couldn't migrate")
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Db { pool }
    }

    /// Upserts a user record. Users are owned by the account service; this
    /// exists for provisioning and tests.
    pub async fn insert_user(&self, user: &User) -> Result<(), Error> {
        let columns = ProfileColumns::from(&user.profile);
        self.pool.execute(query(r#"
                insert into users (id, email, role, full_name, profile_image, organization_name, logo_image)
                values ($1, $2, $3, $4, $5, $6, $7)
                on conflict (id) do update set
                    email = excluded.email,
                    role = excluded.role,
                    full_name = excluded.full_name,
                    profile_image = excluded.profile_image,
                    organization_name = excluded.organization_name,
                    logo_image = excluded.logo_image
            "#)
            .bind(user.id)
            .bind(&user.email)
            .bind(user.role().as_str())
            .bind(columns.full_name)
            .bind(columns.profile_image)
            .bind(columns.organization_name)
            .bind(columns.logo_image))
            .await?;
        Ok(())
    }

    pub async fn set_admin_profile(&self, admin_profile: Option<&AdminProfile>) -> Result<(), Error> {
        match admin_profile {
            Some(admin_profile) => {
                self.pool.execute(query(r#"
                        insert into admin_profile (id, admin_image) values (1, $1)
                        on conflict (id) do update set admin_image = excluded.admin_image
                    "#).bind(&admin_profile.admin_image)).await?;
            }
            None => {
                self.pool.execute("delete from admin_profile").await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Postgres error: {0}")]
    PgError(#[from] sqlx::Error),
    #[error("User record error: {0}")]
    UnknownRole(#[from] UnknownRole),
}

/// Flat column layout of the role-dependent profile data.
#[derive(Debug, Default, PartialEq)]
struct ProfileColumns {
    full_name: Option<String>,
    profile_image: Option<String>,
    organization_name: Option<String>,
    logo_image: Option<String>,
}

impl From<&Profile> for ProfileColumns {
    fn from(profile: &Profile) -> Self {
        match profile {
            Profile::Athlete(person) | Profile::Individual(person) => ProfileColumns {
                full_name: person.full_name.clone(),
                profile_image: person.profile_image.clone(),
                ..Default::default()
            },
            Profile::Club(organization) | Profile::Brand(organization) => ProfileColumns {
                organization_name: organization.name.clone(),
                logo_image: organization.logo_image.clone(),
                ..Default::default()
            },
            Profile::Admin => ProfileColumns::default(),
        }
    }
}

impl ProfileColumns {
    fn into_profile(self, role: Role) -> Profile {
        let person = PersonInfo { full_name: self.full_name, profile_image: self.profile_image };
        let organization = OrganizationInfo { name: self.organization_name, logo_image: self.logo_image };
        match role {
            Role::Athlete => Profile::Athlete(person),
            Role::Individual => Profile::Individual(person),
            Role::Club => Profile::Club(organization),
            Role::Brand => Profile::Brand(organization),
            Role::Admin => Profile::Admin,
        }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, Error> {
    let role: &str = row.try_get("role")?;
    let role: Role = role.parse()?;
    let columns = ProfileColumns {
        full_name: row.try_get("full_name")?,
        profile_image: row.try_get("profile_image")?,
        organization_name: row.try_get("organization_name")?,
        logo_image: row.try_get("logo_image")?,
    };
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        profile: columns.into_profile(role),
    })
}

fn room_from_row(row: &PgRow) -> Result<Room, sqlx::Error> {
    Ok(Room {
        id: row.try_get("id")?,
        participant_a: row.try_get("sender_id")?,
        participant_b: row.try_get("receiver_id")?,
        created_at: row.try_get("created_at")?,
        last_activity: row.try_get("updated_at")?,
    })
}

fn message_from_row(row: &PgRow) -> Result<Message, sqlx::Error> {
    Ok(Message {
        id: row.try_get("id")?,
        room_id: row.try_get("room_id")?,
        sender: row.try_get("sender_id")?,
        receiver: row.try_get("receiver_id")?,
        message: row.try_get("message")?,
        images: row.try_get("images")?,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl DataAccess for Db {
    type Error = Error;

    async fn fetch_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        let mut conn = self.pool.acquire().await?;
        let row = conn
            .fetch_optional(query(&format!("select {USER_COLUMNS} from users where id = $1")).bind(user_id))
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn fetch_users(&self, user_ids: &[UserId]) -> Result<Vec<User>, Error> {
        if user_ids.is_empty() {
            return Ok(vec![]);
        }
        let mut conn = self.pool.acquire().await?;
        conn.fetch_all(query(&format!("select {USER_COLUMNS} from users where id = any($1)")).bind(user_ids))
            .await?
            .iter()
            .map(user_from_row)
            .collect()
    }

    async fn fetch_admin_profile(&self) -> Result<Option<AdminProfile>, Error> {
        let mut conn = self.pool.acquire().await?;
        let res = match conn.fetch_optional("select admin_image from admin_profile where id = 1").await? {
            Some(row) => Some(AdminProfile { admin_image: row.try_get(0)? }),
            None => None,
        };
        Ok(res)
    }

    async fn find_room(&self, user_id_1: &UserId, user_id_2: &UserId) -> Result<Option<Room>, Error> {
        let mut conn = self.pool.acquire().await?;
        let row = conn.fetch_optional(query(&format!(r#"
                select {ROOM_COLUMNS} from rooms
                where least(sender_id, receiver_id) = least($1::uuid, $2::uuid)
                    and greatest(sender_id, receiver_id) = greatest($1::uuid, $2::uuid)
            "#)).bind(user_id_1).bind(user_id_2)).await?;
        Ok(row.as_ref().map(room_from_row).transpose()?)
    }

    async fn fetch_room(&self, room_id: &RoomId) -> Result<Option<Room>, Error> {
        let mut conn = self.pool.acquire().await?;
        let row = conn
            .fetch_optional(query(&format!("select {ROOM_COLUMNS} from rooms where id = $1")).bind(room_id))
            .await?;
        Ok(row.as_ref().map(room_from_row).transpose()?)
    }

    async fn create_room(&self, room: &Room) -> Result<bool, Error> {
        let mut conn = self.pool.acquire().await?;
        let res = conn.execute(query(r#"
                insert into rooms (id, sender_id, receiver_id, created_at, updated_at)
                values ($1, $2, $3, $4, $5)
                on conflict do nothing
            "#)
            .bind(room.id)
            .bind(room.participant_a)
            .bind(room.participant_b)
            .bind(room.created_at)
            .bind(room.last_activity))
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn find_users_rooms(&self, user_id: &UserId) -> Result<Vec<Room>, Error> {
        let mut conn = self.pool.acquire().await?;
        let res = conn.fetch_all(query(&format!(r#"
                select {ROOM_COLUMNS} from rooms
                where sender_id = $1 or receiver_id = $1
                order by updated_at desc
            "#)).bind(user_id)).await?
            .iter()
            .map(room_from_row)
            .collect::<Result<_, _>>()?;
        Ok(res)
    }

    async fn create_message(&self, message: &Message) -> Result<(), Error> {
        let mut transaction = self.pool.begin().await?;
        transaction.execute(query(r#"
                insert into messages (id, room_id, sender_id, receiver_id, message, images, is_read, created_at)
                values ($1, $2, $3, $4, $5, $6, $7, $8)
            "#)
            .bind(message.id)
            .bind(message.room_id)
            .bind(message.sender)
            .bind(message.receiver)
            .bind(&message.message)
            .bind(&message.images)
            .bind(message.is_read)
            .bind(message.created_at))
            .await?;
        transaction.execute(query("update rooms set updated_at = greatest(updated_at, $2) where id = $1")
            .bind(message.room_id)
            .bind(message.created_at))
            .await?;
        transaction.commit().await?;
        Ok(())
    }

    async fn fetch_messages_page(&self, room_id: &RoomId, offset: usize, limit: Option<usize>) -> Result<Vec<Message>, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut query_builder = sqlx::QueryBuilder::new(format!("select {MESSAGE_COLUMNS} from messages where room_id = "));
        query_builder.push_bind(room_id);
        query_builder.push(" order by created_at desc, seq desc");
        query_builder.push(" offset ").push_bind(to_i64(offset));
        if let Some(limit) = limit {
            query_builder.push(" limit ").push_bind(to_i64(limit));
        }

        let res = conn.fetch_all(query_builder.build()).await?
            .iter()
            .map(message_from_row)
            .collect::<Result<_, _>>()?;
        Ok(res)
    }

    async fn fetch_room_history(&self, room_id: &RoomId) -> Result<Vec<Message>, Error> {
        let mut conn = self.pool.acquire().await?;
        let res = conn.fetch_all(query(&format!(r#"
                select {MESSAGE_COLUMNS} from messages
                where room_id = $1
                order by created_at, seq
            "#)).bind(room_id)).await?
            .iter()
            .map(message_from_row)
            .collect::<Result<_, _>>()?;
        Ok(res)
    }

    async fn fetch_unread(&self, room_id: &RoomId, recipient_id: &UserId) -> Result<Vec<Message>, Error> {
        let mut conn = self.pool.acquire().await?;
        let res = conn.fetch_all(query(&format!(r#"
                select {MESSAGE_COLUMNS} from messages
                where room_id = $1 and receiver_id = $2 and not is_read
                order by created_at, seq
            "#)).bind(room_id).bind(recipient_id)).await?
            .iter()
            .map(message_from_row)
            .collect::<Result<_, _>>()?;
        Ok(res)
    }

    async fn count_unread(&self, room_id: &RoomId, recipient_id: &UserId) -> Result<u64, Error> {
        let mut conn = self.pool.acquire().await?;
        let count: i64 = conn.fetch_one(query(r#"
                select count(*) from messages
                where room_id = $1 and receiver_id = $2 and not is_read
            "#).bind(room_id).bind(recipient_id)).await?
            .try_get(0)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn mark_read(&self, room_id: &RoomId, recipient_id: &UserId) -> Result<u64, Error> {
        let mut conn = self.pool.acquire().await?;
        let res = conn.execute(query(r#"
                update messages set is_read = true
                where room_id = $1 and receiver_id = $2 and not is_read
            "#).bind(room_id).bind(recipient_id)).await?;
        Ok(res.rows_affected())
    }
}
