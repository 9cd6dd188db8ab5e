use chrono::{DateTime, TimeDelta, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::result::Error;
use diesel::upsert::excluded;
use diesel_async::{AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection};

use crate::schema::secrets;

const CREATE_TABLE: &str =
    include_str!("../../migrations/2026-10-01-000000_create_secrets/up.sql");

#[derive(Debug, Clone, Insertable)]
pub struct Secret {
    id: String,
    ciphertext: Vec<u8>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl Secret {
    pub fn new(id: &str, ciphertext: Vec<u8>, ttl: TimeDelta) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            ciphertext,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub async fn create_table(conn: &mut AsyncPgConnection) -> Result<(), Error> {
        conn.batch_execute(CREATE_TABLE).await
    }

    /// Upsert; an existing row under the same id is replaced.
    pub async fn insert(self, conn: &mut AsyncPgConnection) -> Result<usize, Error> {
        use crate::schema::secrets::dsl::{ciphertext, created_at, expires_at, id, secrets};

        diesel::insert_into(secrets)
            .values(self)
            .on_conflict(id)
            .do_update()
            .set((
                ciphertext.eq(excluded(ciphertext)),
                expires_at.eq(excluded(expires_at)),
                created_at.eq(excluded(created_at)),
            ))
            .execute(conn)
            .await
    }

    pub async fn exists(secret_id: &str, conn: &mut AsyncPgConnection) -> Result<bool, Error> {
        use crate::schema::secrets::dsl::{expires_at, id, secrets};

        diesel::select(exists(
            secrets
                .filter(id.eq(secret_id))
                .filter(expires_at.gt(Utc::now())),
        ))
        .get_result(conn)
        .await
    }

    /// Single `DELETE ... RETURNING`. The row lock taken by the delete makes
    /// concurrent callers for the same id serialise, and only the first one
    /// gets the row back.
    pub async fn take(
        secret_id: &str,
        conn: &mut AsyncPgConnection,
    ) -> Result<Option<Vec<u8>>, Error> {
        use crate::schema::secrets::dsl::{ciphertext, expires_at, id, secrets};

        diesel::delete(
            secrets
                .filter(id.eq(secret_id))
                .filter(expires_at.gt(Utc::now())),
        )
        .returning(ciphertext)
        .get_result::<Vec<u8>>(conn)
        .await
        .optional()
    }

    pub async fn ping(conn: &mut AsyncPgConnection) -> Result<(), Error> {
        diesel::sql_query("SELECT 1").execute(conn).await.map(|_| ())
    }

    pub async fn clear_expired(conn: &mut AsyncPgConnection) -> Result<usize, Error> {
        use crate::schema::secrets::dsl::{expires_at, secrets};

        diesel::delete(secrets.filter(expires_at.le(Utc::now())))
            .execute(conn)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_expiry_from_ttl() {
        let secret = Secret::new("burnlink:abc", vec![1, 2], TimeDelta::hours(1));
        assert_eq!(secret.id, "burnlink:abc");
        assert_eq!(secret.expires_at - secret.created_at, TimeDelta::hours(1));
    }
}
