use chrono::Utc;
use forum_types::models::{ReactionCounts, ReactionKind, TargetKind, ToggleAction};
use rusqlite::Connection;
use tracing::debug;

use crate::{Database, DbError, OptionalExt, Result};

/// Result of a toggle: what happened and the target's counts afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub action: ToggleAction,
    pub counts: ReactionCounts,
}

/// Table layout for one kind of reaction target.
struct TargetTables {
    target: &'static str,
    target_key: &'static str,
    reactions: &'static str,
}

fn tables(kind: TargetKind) -> TargetTables {
    match kind {
        TargetKind::Post => TargetTables {
            target: "posts",
            target_key: "post_id",
            reactions: "post_reactions",
        },
        TargetKind::Comment => TargetTables {
            target: "comments",
            target_key: "comment_id",
            reactions: "comment_reactions",
        },
    }
}

impl Database {
    /// Apply a like/dislike toggle for `user_id` on a post or comment.
    ///
    /// | current | requested  | result  |
    /// |---------|------------|---------|
    /// | none    | any        | created |
    /// | same    | same       | removed |
    /// | other   | requested  | changed |
    ///
    /// Read, decision, write and recount share one IMMEDIATE transaction, so
    /// concurrent toggles by the same user serialize and never leave more
    /// than one row per (user, target).
    pub fn toggle_reaction(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
        requested: ReactionKind,
    ) -> Result<ToggleOutcome> {
        let t = tables(kind);

        self.with_tx(|tx| {
            let exists: bool = tx.query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)", t.target, t.target_key),
                [target_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(DbError::NotFound);
            }

            let current = current_reaction(tx, &t, user_id, target_id)?;

            let action = match current {
                None => {
                    tx.execute(
                        &format!(
                            "INSERT INTO {} (user_id, {}, reaction_type, created_at) VALUES (?1, ?2, ?3, ?4)",
                            t.reactions, t.target_key
                        ),
                        rusqlite::params![user_id, target_id, requested.code(), Utc::now()],
                    )?;
                    ToggleAction::Created
                }
                Some(existing) if existing == requested => {
                    tx.execute(
                        &format!("DELETE FROM {} WHERE user_id = ?1 AND {} = ?2", t.reactions, t.target_key),
                        [user_id, target_id],
                    )?;
                    ToggleAction::Removed
                }
                Some(_) => {
                    tx.execute(
                        &format!(
                            "UPDATE {} SET reaction_type = ?3 WHERE user_id = ?1 AND {} = ?2",
                            t.reactions, t.target_key
                        ),
                        rusqlite::params![user_id, target_id, requested.code()],
                    )?;
                    ToggleAction::Changed
                }
            };

            let counts = count_reactions(tx, &t, target_id)?;
            debug!("{} {} reaction on {} {}: {:?}", user_id, requested, kind, target_id, action);
            Ok(ToggleOutcome { action, counts })
        })
    }

    #[cfg(test)]
    pub(crate) fn reaction_counts(&self, kind: TargetKind, target_id: &str) -> Result<ReactionCounts> {
        let t = tables(kind);
        self.with_conn(|conn| count_reactions(conn, &t, target_id))
    }

    /// The user's current reaction on a target, if any.
    #[cfg(test)]
    pub(crate) fn user_reaction(
        &self,
        user_id: &str,
        kind: TargetKind,
        target_id: &str,
    ) -> Result<Option<ReactionKind>> {
        let t = tables(kind);
        self.with_conn(|conn| current_reaction(conn, &t, user_id, target_id))
    }
}

fn current_reaction(
    conn: &Connection,
    t: &TargetTables,
    user_id: &str,
    target_id: &str,
) -> Result<Option<ReactionKind>> {
    let code: Option<i64> = conn
        .query_row(
            &format!("SELECT reaction_type FROM {} WHERE user_id = ?1 AND {} = ?2", t.reactions, t.target_key),
            [user_id, target_id],
            |row| row.get(0),
        )
        .optional()?;

    code.map(|c| {
        ReactionKind::from_code(c).ok_or_else(|| DbError::Corrupt(format!("reaction_type {c}")))
    })
    .transpose()
}

fn count_reactions(conn: &Connection, t: &TargetTables, target_id: &str) -> Result<ReactionCounts> {
    let (likes, dislikes): (i64, i64) = conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(reaction_type = 1), 0), COALESCE(SUM(reaction_type = 2), 0)
             FROM {} WHERE {} = ?1",
            t.reactions, t.target_key
        ),
        [target_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(ReactionCounts {
        like_count: likes.max(0) as u64,
        dislike_count: dislikes.max(0) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, String, String) {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("alice", "alice@example.com", "hash").unwrap();
        let post = db.create_post(&user.id, "first post on the forum").unwrap();
        (db, user.id, post.id)
    }

    fn toggle(db: &Database, user: &str, post: &str, kind: ReactionKind) -> ToggleOutcome {
        db.toggle_reaction(user, TargetKind::Post, post, kind).unwrap()
    }

    #[test]
    fn like_like_dislike_dislike_ends_empty() {
        let (db, user, post) = setup();
        let actions: Vec<ToggleAction> = [
            ReactionKind::Like,
            ReactionKind::Like,
            ReactionKind::Dislike,
            ReactionKind::Dislike,
        ]
        .into_iter()
        .map(|kind| toggle(&db, &user, &post, kind).action)
        .collect();

        assert_eq!(
            actions,
            vec![
                ToggleAction::Created,
                ToggleAction::Removed,
                ToggleAction::Created,
                ToggleAction::Removed
            ]
        );
        assert_eq!(db.user_reaction(&user, TargetKind::Post, &post).unwrap(), None);
        assert_eq!(db.reaction_counts(TargetKind::Post, &post).unwrap(), ReactionCounts::default());
    }

    #[test]
    fn switching_kind_updates_in_place() {
        let (db, user, post) = setup();

        let liked = toggle(&db, &user, &post, ReactionKind::Like);
        assert_eq!(liked.action, ToggleAction::Created);
        assert_eq!(liked.counts, ReactionCounts { like_count: 1, dislike_count: 0 });

        let switched = toggle(&db, &user, &post, ReactionKind::Dislike);
        assert_eq!(switched.action, ToggleAction::Changed);
        assert_eq!(switched.counts, ReactionCounts { like_count: 0, dislike_count: 1 });

        let back = toggle(&db, &user, &post, ReactionKind::Like);
        assert_eq!(back.action, ToggleAction::Changed);
        assert_eq!(
            db.user_reaction(&user, TargetKind::Post, &post).unwrap(),
            Some(ReactionKind::Like)
        );
    }

    #[test]
    fn counts_aggregate_across_users() {
        let (db, alice, post) = setup();
        let bob = db.create_user("bobby", "bob@example.com", "hash").unwrap();
        let carol = db.create_user("carol", "carol@example.com", "hash").unwrap();

        toggle(&db, &alice, &post, ReactionKind::Like);
        toggle(&db, &bob.id, &post, ReactionKind::Like);
        let outcome = toggle(&db, &carol.id, &post, ReactionKind::Dislike);

        assert_eq!(outcome.counts, ReactionCounts { like_count: 2, dislike_count: 1 });
    }

    #[test]
    fn missing_target_is_not_found() {
        let (db, user, _post) = setup();
        assert!(matches!(
            db.toggle_reaction(&user, TargetKind::Post, "nope", ReactionKind::Like),
            Err(DbError::NotFound)
        ));
        assert!(matches!(
            db.toggle_reaction(&user, TargetKind::Comment, "nope", ReactionKind::Like),
            Err(DbError::NotFound)
        ));
    }

    #[test]
    fn comment_reactions_are_separate_from_post_reactions() {
        let (db, user, post) = setup();
        let comment = db.create_comment(&post, &user, "nice one").unwrap();

        toggle(&db, &user, &post, ReactionKind::Like);
        let outcome = db
            .toggle_reaction(&user, TargetKind::Comment, &comment.id, ReactionKind::Dislike)
            .unwrap();

        assert_eq!(outcome.action, ToggleAction::Created);
        assert_eq!(outcome.counts, ReactionCounts { like_count: 0, dislike_count: 1 });
        assert_eq!(
            db.reaction_counts(TargetKind::Post, &post).unwrap(),
            ReactionCounts { like_count: 1, dislike_count: 0 }
        );
    }
}
