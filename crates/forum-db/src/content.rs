//! Posts and comments: just enough to give reactions a target and an owner.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{CommentRow, PostRow};
use crate::{Database, DbError, OptionalExt, Result};

impl Database {
    pub fn create_post(&self, user_id: &str, content: &str) -> Result<PostRow> {
        let row = PostRow {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (post_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![row.id, row.user_id, row.content, row.created_at],
            )?;
            Ok(())
        })?;

        Ok(row)
    }

    pub fn create_comment(&self, post_id: &str, user_id: &str, content: &str) -> Result<CommentRow> {
        let row = CommentRow {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };

        self.with_tx(|tx| {
            let post_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM posts WHERE post_id = ?1)",
                [post_id],
                |r| r.get(0),
            )?;
            if !post_exists {
                return Err(DbError::NotFound);
            }

            tx.execute(
                "INSERT INTO comments (comment_id, post_id, user_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![row.id, row.post_id, row.user_id, row.content, row.created_at],
            )?;
            Ok(())
        })?;

        Ok(row)
    }

    /// Delete a post owned by `user_id`. Its comments and reactions cascade.
    pub fn delete_post(&self, post_id: &str, user_id: &str) -> Result<()> {
        self.delete_owned("posts", "post_id", post_id, user_id)
    }

    pub fn delete_comment(&self, comment_id: &str, user_id: &str) -> Result<()> {
        self.delete_owned("comments", "comment_id", comment_id, user_id)
    }

    fn delete_owned(&self, table: &str, key: &str, id: &str, user_id: &str) -> Result<()> {
        self.with_tx(|tx| {
            let owner: Option<String> = tx
                .query_row(
                    &format!("SELECT user_id FROM {table} WHERE {key} = ?1"),
                    [id],
                    |r| r.get(0),
                )
                .optional()?;

            match owner {
                None => Err(DbError::NotFound),
                Some(owner) if owner != user_id => Err(DbError::NotOwner),
                Some(_) => {
                    tx.execute(&format!("DELETE FROM {table} WHERE {key} = ?1"), [id])?;
                    Ok(())
                }
            }
        })
    }
}
