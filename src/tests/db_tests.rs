#[cfg(test)]
mod tests {
    use crate::db;
    use crate::error::AppError;
    use crate::pagination::PageRequest;
    use crate::store::posts::{self, PostFilter};
    use crate::store::{comments, follows, users};
    use crate::models::User;
    use crate::store::users::NewUser;
    use crate::tests::{create_comment_at, create_post_at, create_user, test_state, ts};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_db_creates_schema_idempotently() {
        let state = test_state("").await;
        db::init_db(&state.db).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(&state.db)
            .await
            .unwrap();
        for table in ["comments", "follows", "posts", "users"] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }

        let indexes: Vec<String> = sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='index'")
            .fetch_all(&state.db)
            .await
            .unwrap();
        assert!(indexes.contains(&"idx_follows_followee".to_string()));
        assert!(indexes.contains(&"idx_posts_created".to_string()));
    }

    #[tokio::test]
    async fn test_follow_constraints_enforced_by_schema() {
        let state = test_state("").await;
        let alice = create_user(&state, "alice").await;
        let bob = create_user(&state, "bob").await;

        let self_follow = sqlx::query("INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?1)")
            .bind(alice.id)
            .execute(&state.db)
            .await;
        assert!(self_follow.is_err());

        sqlx::query("INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?2)")
            .bind(alice.id)
            .bind(bob.id)
            .execute(&state.db)
            .await
            .unwrap();
        let duplicate = sqlx::query("INSERT INTO follows (follower_id, followee_id) VALUES (?1, ?2)")
            .bind(alice.id)
            .bind(bob.id)
            .execute(&state.db)
            .await
            .unwrap_err();
        assert!(crate::store::is_unique_violation(&duplicate));
    }

    #[tokio::test]
    async fn test_deleting_user_cascades() {
        let state = test_state("").await;
        let alice = create_user(&state, "alice").await;
        let bob = create_user(&state, "bob").await;
        let post = create_post_at(&state, &alice, "doomed", ts(2023, 10, 1, 8, 0, 0)).await;
        create_comment_at(&state, &bob, &post, "also doomed", ts(2023, 10, 1, 9, 0, 0)).await;
        follows::follow(&state.db, &bob, alice.id).await.unwrap();

        sqlx::query("DELETE FROM users WHERE id = ?1").bind(alice.id).execute(&state.db).await.unwrap();

        let remaining: (i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM posts), (SELECT COUNT(*) FROM comments), (SELECT COUNT(*) FROM follows)",
        )
        .fetch_one(&state.db)
        .await
        .unwrap();
        assert_eq!(remaining, (0, 0, 0));
    }

    #[tokio::test]
    async fn test_comment_requires_existing_post() {
        let state = test_state("").await;
        let alice = create_user(&state, "alice").await;

        let err = comments::create(&state.db, alice.id, 77, "orphan", ts(2023, 10, 1, 8, 0, 0)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == "Post #77 not found"));
    }

    #[tokio::test]
    async fn test_rejected_follow_writes_nothing() {
        let state = test_state("").await;
        let alice = create_user(&state, "alice").await;

        assert!(matches!(follows::follow(&state.db, &alice, alice.id).await, Err(AppError::BadRequest(_))));
        assert!(matches!(follows::follow(&state.db, &alice, 555).await, Err(AppError::NotFound(_))));
        assert!(matches!(follows::follow(&state.db, &alice, -3).await, Err(AppError::BadRequest(_))));

        let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows").fetch_one(&state.db).await.unwrap();
        assert_eq!(edges, 0);
    }

    #[tokio::test]
    async fn test_follower_lists_batched_per_user() {
        let state = test_state("").await;
        let alice = create_user(&state, "alice").await;
        let bob = create_user(&state, "bob").await;
        let carol = create_user(&state, "carol").await;
        follows::follow(&state.db, &alice, carol.id).await.unwrap();
        follows::follow(&state.db, &bob, carol.id).await.unwrap();
        follows::follow(&state.db, &carol, alice.id).await.unwrap();

        let followers = follows::followers_of(&state.db, &[alice.id, bob.id, carol.id]).await.unwrap();
        let names = |id: i64| -> Vec<String> {
            followers.get(&id).map(|v| v.iter().map(|u| u.username.clone()).collect()).unwrap_or_default()
        };
        assert_eq!(names(carol.id), vec!["alice", "bob"]);
        assert_eq!(names(alice.id), vec!["carol"]);
        assert!(names(bob.id).is_empty());

        let following = follows::following_of(&state.db, &[carol.id]).await.unwrap();
        assert_eq!(following[&carol.id].len(), 1);
        assert!(follows::followers_of(&state.db, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_listing_and_counts() {
        let state = test_state("").await;
        let alice = create_user(&state, "alice").await;
        let bob = create_user(&state, "bob").await;
        create_post_at(&state, &alice, "a1", ts(2023, 10, 1, 8, 0, 0)).await;
        create_post_at(&state, &bob, "b1", ts(2023, 10, 2, 8, 0, 0)).await;

        let filter = PostFilter { author_id: Some(bob.id), ..Default::default() };
        assert_eq!(posts::count(&state.db, &filter).await.unwrap(), 1);
        assert_eq!(posts::count_by_author(&state.db, alice.id).await.unwrap(), 1);

        let page = PageRequest { page: 1, page_size: 10 };
        let listed = posts::list(&state.db, &PostFilter::default(), page, 3).await.unwrap();
        assert_eq!(listed.count, 2);
        assert_eq!(listed.items[0].post.content, "b1");
        assert_eq!(listed.items[0].post.author_username, "bob");

        let listed_users = users::list(&state.db, page).await.unwrap();
        assert_eq!(listed_users.count, 2);
        assert!(users::email_taken(&state.db, "ALICE@example.com").await.unwrap());
        assert!(!users::username_taken(&state.db, "carol").await.unwrap());
    }

    #[tokio::test]
    async fn test_on_disk_database_created_with_parent_dir() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("nested").join("plaza.db");
        let url = format!("sqlite://{}", db_path.display());

        let pool = db::connect(&url, 2).await.unwrap();
        db::init_db(&pool).await.unwrap();
        assert!(db_path.exists());

        let journal: String = sqlx::query_scalar("PRAGMA journal_mode").fetch_one(&pool).await.unwrap();
        assert_eq!(journal.to_lowercase(), "wal");
        let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.unwrap();
        assert_eq!(fk, 1);
        pool.close().await;
    }

    async fn on_disk_user(pool: &sqlx::SqlitePool, username: &str) -> User {
        let email = format!("{}@example.com", username);
        users::create(pool, &NewUser { username, email: &email, password_hash: "unused" }).await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_on_shared_pool() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", dir.path().join("plaza.db").display());
        let pool = db::connect(&url, 16).await.unwrap();
        db::init_db(&pool).await.unwrap();

        let alice = on_disk_user(&pool, "alice").await;
        let bob = on_disk_user(&pool, "bob").await;
        let post = posts::create(&pool, alice.id, "popular", ts(2023, 10, 1, 8, 0, 0)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let pool = pool.clone();
            let (author, post_id) = (bob.id, post.id);
            handles.push(tokio::spawn(async move {
                comments::create(&pool, author, post_id, &format!("c{}", i), ts(2023, 10, 1, 9, 0, i)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(comments::list_for_post(&pool, post.id).await.unwrap().len(), 20);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let (pool, acting) = (pool.clone(), alice.clone());
            let target = bob.id;
            handles.push(tokio::spawn(async move { follows::follow(&pool, &acting, target).await }));
        }
        let (mut ok, mut duplicate) = (0, 0);
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(AppError::BadRequest(msg)) if msg == follows::ALREADY_FOLLOWING => duplicate += 1,
                Err(other) => panic!("unexpected follow error: {:?}", other),
            }
        }
        assert_eq!((ok, duplicate), (1, 9));

        let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows").fetch_one(&pool).await.unwrap();
        assert_eq!(edges, 1);
        pool.close().await;
    }
}
