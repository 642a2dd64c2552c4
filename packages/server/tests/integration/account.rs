use chrono::{Duration, Utc};
use sea_orm::prelude::Expr;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use blog_server::config::AuthConfig;
use blog_server::entity::{user, user_token};
use blog_server::utils::jwt;

use crate::common::{FilePart, JWT_SECRET, PASSWORD, PUBLIC_BASE_URL, TestApp, routes};

fn auth_config() -> AuthConfig {
    AuthConfig::new(JWT_SECRET, "blog-server", "blog-client")
}

mod registration {
    use super::*;

    #[tokio::test]
    async fn new_user_is_created_unconfirmed_and_emailed() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({
                    "email": "  Alice@Example.com ",
                    "password": PASSWORD,
                    "name": "Alice",
                    "surname": "Smith",
                }),
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["email"], "alice@example.com");

        let stored = app.find_user("alice@example.com").await.unwrap();
        assert!(!stored.email_confirmed);
        assert_eq!(stored.image_url, user::DEFAULT_IMAGE_URL);
        assert_ne!(stored.password, PASSWORD);

        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html_body.contains(&format!(
            "http://front.test/confirm-email?userId={}&token=",
            stored.id
        )));
    }

    #[tokio::test]
    async fn cannot_register_with_an_already_used_email() {
        let app = TestApp::spawn().await;
        app.register("a@x.com").await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"email": "A@X.com", "password": PASSWORD, "name": "A", "surname": "B"}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let count = user::Entity::find()
            .filter(user::Column::Email.eq("a@x.com"))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn weak_password_is_rejected() {
        let app = TestApp::spawn().await;

        for password in ["password", "PASSWORD1!", "Pw1", "Password1"] {
            let res = app
                .post_without_token(
                    routes::REGISTER,
                    &json!({"email": "a@x.com", "password": password, "name": "A", "surname": "B"}),
                )
                .await;
            assert_eq!(res.status, 400, "password {password:?} was accepted");
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
        }
        assert!(app.find_user("a@x.com").await.is_none());
    }

    #[tokio::test]
    async fn malformed_email_or_missing_fields_are_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"email": "not-an-email", "password": PASSWORD, "name": "A", "surname": "B"}),
            )
            .await;
        assert_eq!(res.status, 400);

        let res = app
            .post_without_token(routes::REGISTER, &json!({"email": "a@x.com"}))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn failed_confirmation_email_keeps_the_account() {
        let app = TestApp::spawn().await;
        app.mailer.set_failing(true);

        let res = app
            .post_without_token(
                routes::REGISTER,
                &json!({"email": "a@x.com", "password": PASSWORD, "name": "A", "surname": "B"}),
            )
            .await;

        assert_eq!(res.status, 500);
        assert_eq!(res.body["code"], "EMAIL_DELIVERY_FAILED");

        let stored = app.find_user("a@x.com").await.expect("user should exist");
        let tokens = user_token::Entity::find()
            .filter(user_token::Column::UserId.eq(stored.id))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(tokens, 1);
    }
}

mod confirmation {
    use super::*;

    #[tokio::test]
    async fn unconfirmed_login_fails_and_resends_one_email_per_attempt() {
        let app = TestApp::spawn().await;
        app.register("a@x.com").await;
        assert_eq!(app.mailer.count_to("a@x.com"), 1);

        for attempt in 1..=2 {
            let res = app.login("a@x.com", PASSWORD).await;
            assert_eq!(res.status, 400);
            assert_eq!(res.body["code"], "EMAIL_NOT_CONFIRMED");
            assert_eq!(app.mailer.count_to("a@x.com"), 1 + attempt);
        }
    }

    #[tokio::test]
    async fn confirmed_user_can_log_in() {
        let app = TestApp::spawn().await;
        let id = app.register("a@x.com").await;
        app.confirm(id, "a@x.com").await;

        assert!(app.find_user("a@x.com").await.unwrap().email_confirmed);
        let res = app.login("a@x.com", PASSWORD).await;
        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn tampered_token_is_rejected_and_leaves_account_unconfirmed() {
        let app = TestApp::spawn().await;
        let id = app.register("a@x.com").await;
        let token = app.mailer.last_token_for("a@x.com");
        let flipped = if token.ends_with('0') { '1' } else { '0' };
        let tampered = format!("{}{flipped}", &token[..token.len() - 1]);

        let res = app
            .get_without_token(&format!("{}?userId={id}&token={tampered}", routes::CONFIRM_EMAIL))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_TOKEN");
        assert!(!app.find_user("a@x.com").await.unwrap().email_confirmed);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let app = TestApp::spawn().await;
        let id = app.register("a@x.com").await;
        let token = app.mailer.last_token_for("a@x.com");

        user_token::Entity::update_many()
            .col_expr(
                user_token::Column::ExpiresAt,
                Expr::value(Utc::now() - Duration::minutes(1)),
            )
            .filter(user_token::Column::UserId.eq(id))
            .exec(&app.db)
            .await
            .unwrap();

        let res = app
            .get_without_token(&format!("{}?userId={id}&token={token}", routes::CONFIRM_EMAIL))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_TOKEN");
        assert!(!app.find_user("a@x.com").await.unwrap().email_confirmed);
    }

    #[tokio::test]
    async fn token_is_single_use() {
        let app = TestApp::spawn().await;
        let id = app.register("a@x.com").await;
        let token = app.mailer.last_token_for("a@x.com");
        let path = format!("{}?userId={id}&token={token}", routes::CONFIRM_EMAIL);

        assert_eq!(app.get_without_token(&path).await.status, 200);
        let again = app.get_without_token(&path).await;
        assert_eq!(again.status, 400);
        assert_eq!(again.body["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn missing_parameters_are_rejected() {
        let app = TestApp::spawn().await;
        let id = app.register("a@x.com").await;
        let token = app.mailer.last_token_for("a@x.com");

        for query in [
            format!("?token={token}"),
            format!("?userId=0&token={token}"),
            format!("?userId={id}"),
        ] {
            let res = app
                .get_without_token(&format!("{}{query}", routes::CONFIRM_EMAIL))
                .await;
            assert_eq!(res.status, 400, "query {query} was accepted");
            assert_eq!(res.body["code"], "INVALID_TOKEN");
        }
    }

    #[tokio::test]
    async fn token_of_another_user_is_rejected() {
        let app = TestApp::spawn().await;
        let a = app.register("a@x.com").await;
        app.register("b@x.com").await;
        let b_token = app.mailer.last_token_for("b@x.com");

        let res = app
            .get_without_token(&format!("{}?userId={a}&token={b_token}", routes::CONFIRM_EMAIL))
            .await;
        assert_eq!(res.status, 400);
    }
}

mod login {
    use super::*;

    #[tokio::test]
    async fn issues_a_thirty_minute_token_for_the_email() {
        let app = TestApp::spawn().await;
        let id = app.register("a@x.com").await;
        app.confirm(id, "a@x.com").await;

        let res = app.login("A@x.com", PASSWORD).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["email"], "a@x.com");

        let token = res.body["token"].as_str().unwrap();
        let claims = jwt::verify(token, &auth_config()).unwrap();
        assert_eq!(claims.sub, "a@x.com");
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_are_invalid_credentials() {
        let app = TestApp::spawn().await;
        app.create_authenticated_user("a@x.com").await;

        let res = app.login("nobody@x.com", PASSWORD).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");

        let res = app.login("a@x.com", "Wrong1!pw").await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn repeated_failures_lock_the_account() {
        let app = TestApp::spawn().await;
        app.create_authenticated_user("a@x.com").await;

        for _ in 0..4 {
            let res = app.login("a@x.com", "Wrong1!pw").await;
            assert_eq!(res.body["code"], "INVALID_CREDENTIALS");
        }
        let res = app.login("a@x.com", "Wrong1!pw").await;
        assert_eq!(res.body["code"], "LOCKED_OUT");

        let res = app.login("a@x.com", PASSWORD).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "LOCKED_OUT");
    }

    #[tokio::test]
    async fn success_resets_the_failure_counter() {
        let app = TestApp::spawn().await;
        app.create_authenticated_user("a@x.com").await;

        for _ in 0..3 {
            app.login("a@x.com", "Wrong1!pw").await;
        }
        assert_eq!(app.login("a@x.com", PASSWORD).await.status, 200);
        assert_eq!(
            app.find_user("a@x.com").await.unwrap().access_failed_count,
            0
        );
    }

    #[tokio::test]
    async fn lockout_can_be_disabled() {
        let app = TestApp::spawn_with(|c| c.auth.max_failed_attempts = 0).await;
        app.create_authenticated_user("a@x.com").await;

        for _ in 0..8 {
            app.login("a@x.com", "Wrong1!pw").await;
        }
        assert_eq!(app.login("a@x.com", PASSWORD).await.status, 200);
    }

    #[tokio::test]
    async fn logout_is_stateless() {
        let app = TestApp::spawn().await;
        let res = app.post_without_token(routes::LOGOUT, &json!({})).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["message"], "Logout");
    }
}

mod bearer_tokens {
    use super::*;

    #[tokio::test]
    async fn me_returns_the_current_user() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_authenticated_user("a@x.com").await;

        let res = app.get_with_token(routes::ME, &token).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["email"], "a@x.com");
        assert_eq!(res.body["user_name"], "a@x.com");
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app.get_without_token(routes::ME).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn expired_token_fails_closed() {
        let app = TestApp::spawn().await;
        app.create_authenticated_user("a@x.com").await;

        let stale = jwt::sign_at(
            "a@x.com",
            Utc::now() - Duration::minutes(30) - Duration::seconds(1),
            &auth_config(),
        )
        .unwrap();
        let res = app.get_with_token(routes::ME, &stale.token).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn token_signed_with_another_key_fails_closed() {
        let app = TestApp::spawn().await;
        app.create_authenticated_user("a@x.com").await;

        let forged =
            jwt::sign("a@x.com", &AuthConfig::new("other-key", "blog-server", "blog-client"))
                .unwrap();
        let res = app.get_with_token(routes::ME, &forged.token).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn malformed_authorization_header_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app
            .client
            .get(format!("http://{}{}", app.addr, routes::ME))
            .header("Authorization", "Basic abc")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 401);
    }
}

mod users {
    use super::*;

    #[tokio::test]
    async fn listing_never_exposes_password_hashes() {
        let app = TestApp::spawn().await;
        app.register("a@x.com").await;
        app.register("b@x.com").await;

        let res = app.get_without_token(routes::USERS).await;
        assert_eq!(res.status, 200);
        let users = res.body.as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u.get("password").is_none()));
        assert_eq!(users[0]["email"], "a@x.com");
    }

    #[tokio::test]
    async fn get_user_by_id() {
        let app = TestApp::spawn().await;
        let id = app.register("a@x.com").await;

        let res = app.get_without_token(&routes::user(id)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["email"], "a@x.com");
        assert_eq!(res.body["name"], "Test");

        let res = app.get_without_token(&routes::user(id + 100)).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn user_can_delete_own_account() {
        let app = TestApp::spawn().await;
        let (id, token) = app.create_authenticated_user("a@x.com").await;

        let res = app.delete_with_token(&routes::user(id), &token).await;
        assert_eq!(res.status, 204);
        assert_eq!(app.get_without_token(&routes::user(id)).await.status, 404);

        let res = app.get_with_token(routes::ME, &token).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn cannot_delete_another_account() {
        let app = TestApp::spawn().await;
        let (a, _) = app.create_authenticated_user("a@x.com").await;
        let (_, b_token) = app.create_authenticated_user("b@x.com").await;

        let res = app.delete_with_token(&routes::user(a), &b_token).await;
        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn admin_can_delete_another_account() {
        let app = TestApp::spawn_with(|c| c.auth.admin_emails = vec!["admin@x.com".into()]).await;
        let (a, _) = app.create_authenticated_user("a@x.com").await;
        let (_, admin) = app.create_authenticated_user("admin@x.com").await;

        let res = app.delete_with_token(&routes::user(a), &admin).await;
        assert_eq!(res.status, 204);

        let res = app.delete_with_token(&routes::user(a), &admin).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn user_owning_blogs_cannot_be_deleted() {
        let app = TestApp::spawn().await;
        let (id, token) = app.create_authenticated_user("a@x.com").await;
        let blog_id = app.create_blog(&token, "T", vec![]).await;

        let res = app.delete_with_token(&routes::user(id), &token).await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
        assert_eq!(app.get_without_token(&routes::blog(blog_id)).await.status, 200);
    }

    #[tokio::test]
    async fn deleting_a_user_removes_their_reviews_but_not_other_blogs() {
        let app = TestApp::spawn().await;
        let (_, owner) = app.create_authenticated_user("owner@x.com").await;
        let (reviewer_id, reviewer) = app.create_authenticated_user("reviewer@x.com").await;
        let (_, replier) = app.create_authenticated_user("replier@x.com").await;

        let blog_id = app.create_blog(&owner, "T", vec![]).await;
        let review = app.create_review(&reviewer, blog_id, "first", None).await;
        let reply = app
            .create_review(&replier, blog_id, "answer", Some(review))
            .await;

        let res = app
            .delete_with_token(&routes::user(reviewer_id), &reviewer)
            .await;
        assert_eq!(res.status, 204, "{}", res.text);

        let blog = app.get_without_token(&routes::blog(blog_id)).await;
        assert_eq!(blog.status, 200);
        assert_eq!(blog.body["review_count"], 1);
        let reviews = blog.body["reviews"].as_array().unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0]["id"], reply);
        assert!(reviews[0]["parent_review_id"].is_null());
    }
}

mod profile_image {
    use super::*;

    #[tokio::test]
    async fn upload_replaces_the_profile_image() {
        let app = TestApp::spawn().await;
        let (id, token) = app.create_authenticated_user("a@x.com").await;

        let first = app
            .multipart(
                reqwest::Method::POST,
                &routes::profile_image(id),
                &[],
                vec![FilePart::png("me.png")],
                Some(&token),
            )
            .await;
        assert_eq!(first.status, 200, "{}", first.text);
        let first_url = first.body["image_url"].as_str().unwrap().to_string();
        assert!(first_url.starts_with(PUBLIC_BASE_URL));
        assert!(first_url.ends_with(".png"));
        assert_eq!(app.find_user("a@x.com").await.unwrap().image_url, first_url);

        let second = app
            .multipart(
                reqwest::Method::POST,
                &routes::profile_image(id),
                &[],
                vec![FilePart::png("me2.png")],
                Some(&token),
            )
            .await;
        assert_eq!(second.status, 200);

        let blobs = app.stored_blobs().await;
        assert_eq!(blobs.len(), 1);
        assert!(second.body["image_url"].as_str().unwrap().ends_with(&blobs[0]));
    }

    #[tokio::test]
    async fn non_image_is_rejected() {
        let app = TestApp::spawn().await;
        let (id, token) = app.create_authenticated_user("a@x.com").await;

        let res = app
            .multipart(
                reqwest::Method::POST,
                &routes::profile_image(id),
                &[],
                vec![FilePart::text("notes.txt")],
                Some(&token),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "BAD_FILE_TYPE");
        assert!(app.stored_blobs().await.is_empty());
        assert_eq!(
            app.find_user("a@x.com").await.unwrap().image_url,
            user::DEFAULT_IMAGE_URL
        );
    }

    #[tokio::test]
    async fn cannot_change_another_users_image() {
        let app = TestApp::spawn().await;
        let (a, _) = app.create_authenticated_user("a@x.com").await;
        let (_, b_token) = app.create_authenticated_user("b@x.com").await;

        let res = app
            .multipart(
                reqwest::Method::POST,
                &routes::profile_image(a),
                &[],
                vec![FilePart::png("me.png")],
                Some(&b_token),
            )
            .await;
        assert_eq!(res.status, 403);
    }
}

mod password_reset {
    use super::*;

    async fn request_reset(app: &TestApp, email: &str) -> String {
        let res = app
            .post_without_token(routes::FORGOT_PASSWORD, &json!({"email": email}))
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        app.mailer.last_token_for(email)
    }

    #[tokio::test]
    async fn reset_flow_changes_the_password() {
        let app = TestApp::spawn().await;
        app.create_authenticated_user("a@x.com").await;
        let token = request_reset(&app, "a@x.com").await;
        assert!(
            app.mailer.sent().last().unwrap().html_body.contains(
                "http://front.test/reset-password?email=a%40x.com&token="
            )
        );

        let res = app
            .post_without_token(
                routes::RESET_PASSWORD,
                &json!({
                    "email": "a@x.com",
                    "token": token,
                    "password": "N3w!pass",
                    "confirmPassword": "N3w!pass",
                }),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        assert_eq!(app.login("a@x.com", PASSWORD).await.status, 400);
        assert_eq!(app.login("a@x.com", "N3w!pass").await.status, 200);

        let again = app
            .post_without_token(
                routes::RESET_PASSWORD,
                &json!({
                    "email": "a@x.com",
                    "token": token,
                    "password": "Other1!x",
                    "confirm_password": "Other1!x",
                }),
            )
            .await;
        assert_eq!(again.status, 400);
        assert_eq!(again.body["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn mismatched_confirmation_is_rejected() {
        let app = TestApp::spawn().await;
        app.create_authenticated_user("a@x.com").await;
        let token = request_reset(&app, "a@x.com").await;

        let res = app
            .post_without_token(
                routes::RESET_PASSWORD,
                &json!({
                    "email": "a@x.com",
                    "token": token,
                    "password": "N3w!pass",
                    "confirmPassword": "N3w!pasz",
                }),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(app.login("a@x.com", PASSWORD).await.status, 200);
    }

    #[tokio::test]
    async fn unknown_and_unconfirmed_accounts_are_reported_by_default() {
        let app = TestApp::spawn().await;
        app.register("pending@x.com").await;

        let res = app
            .post_without_token(routes::FORGOT_PASSWORD, &json!({"email": "nobody@x.com"}))
            .await;
        assert_eq!(res.status, 404);

        let res = app
            .post_without_token(routes::FORGOT_PASSWORD, &json!({"email": "pending@x.com"}))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "EMAIL_NOT_CONFIRMED");
    }

    #[tokio::test]
    async fn unknown_accounts_can_be_hidden() {
        let app = TestApp::spawn_with(|c| c.auth.reveal_unknown_accounts = false).await;
        app.create_authenticated_user("a@x.com").await;

        let unknown = app
            .post_without_token(routes::FORGOT_PASSWORD, &json!({"email": "nobody@x.com"}))
            .await;
        let known = app
            .post_without_token(routes::FORGOT_PASSWORD, &json!({"email": "a@x.com"}))
            .await;

        assert_eq!(unknown.status, 200);
        assert_eq!(unknown.body, known.body);
        assert_eq!(app.mailer.count_to("nobody@x.com"), 0);
    }
}
