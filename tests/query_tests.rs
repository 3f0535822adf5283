//! Filtering, sorting and paging through the collection endpoints

mod common;

use axum::http::StatusCode;
use common::*;
use hyperrest::prelude::*;

mod filter_tests {
    use super::*;

    #[tokio::test]
    async fn test_comparison_filter() {
        let h = harness();
        seed_people(&h.server, &[10, 30, 45]).await;

        let response = h
            .server
            .get("/Person/")
            .add_query_param("filter", "age >= 30")
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(result_keys(&body), vec![json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn test_filters_are_conjunctive() {
        let h = harness();
        seed_people(&h.server, &[10, 30, 45]).await;

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("filter", "age > 10")
            .add_query_param("filter", "age < 45")
            .await
            .json();
        assert_eq!(result_keys(&body), vec![json!(2)]);
    }

    #[tokio::test]
    async fn test_expression_without_spaces_is_ignored() {
        let h = harness();
        seed_people(&h.server, &[10, 30, 45]).await;

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("filter", "age>=30")
            .await
            .json();
        assert_eq!(result_keys(&body).len(), 3);
    }

    #[tokio::test]
    async fn test_string_value_may_contain_spaces() {
        let h = harness();
        create(&h.server, "Person", json!({"name": "Ada Lovelace"})).await;
        create(&h.server, "Person", json!({"name": "Ada"})).await;

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("filter", "name == Ada Lovelace")
            .await
            .json();
        assert_eq!(result_keys(&body), vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_in_filter() {
        let h = harness();
        seed_people(&h.server, &[10, 30, 45]).await;

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("filter", "age IN 10,45,99")
            .await
            .json();
        assert_eq!(result_keys(&body), vec![json!(1), json!(3)]);
    }

    #[tokio::test]
    async fn test_key_filter() {
        let h = harness();
        seed_people(&h.server, &[10, 30, 45]).await;

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("filter", "key != 2")
            .await
            .json();
        assert_eq!(result_keys(&body), vec![json!(1), json!(3)]);

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("filter", "key IN 3,1")
            .await
            .json();
        assert_eq!(result_keys(&body), vec![json!(1), json!(3)]);
    }

    #[tokio::test]
    async fn test_reference_filter_accepts_uri() {
        let h = harness();
        create(&h.server, "Person", json!({"key": 1, "name": "Ada"})).await;
        create(&h.server, "Pet", json!({"name": "Tom", "owner": 1})).await;
        create(&h.server, "Pet", json!({"name": "Stray"})).await;

        let body: Value = h
            .server
            .get("/Pet/")
            .add_query_param("filter", "owner == http://api.test/Person/1")
            .await
            .json();
        assert_eq!(result_keys(&body), vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_unknown_field() {
        let h = harness();

        let response = h
            .server
            .get("/Person/")
            .add_query_param("filter", "shoe == 44")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["code"], "BAD_FILTER_FIELD");
        assert_eq!(body["message"], "\"shoe\" is not a valid field in Person");
        assert_eq!(body["details"]["field"], "shoe");
    }

    #[tokio::test]
    async fn test_relationship_is_not_filterable() {
        let h = harness();

        let response = h
            .server
            .get("/Person/")
            .add_query_param("filter", "pets == 1")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_operator() {
        let h = harness();

        let response = h
            .server
            .get("/Person/")
            .add_query_param("filter", "age =~ 3")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["code"], "BAD_OPERATOR");
        assert_eq!(body["message"], "Bad operator: =~");
    }

    #[tokio::test]
    async fn test_undecodable_value() {
        let h = harness();

        let response = h
            .server
            .get("/Person/")
            .add_query_param("filter", "age > thirty")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["code"], "BAD_FILTER_VALUE");
    }

    #[tokio::test]
    async fn test_bad_filter_on_delete_deletes_nothing() {
        let h = harness();
        seed_people(&h.server, &[10]).await;

        h.server
            .delete("/Person/")
            .add_query_param("filter", "shoe == 44")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(h.store.count("Person"), 1);
    }
}

mod sort_tests {
    use super::*;

    #[tokio::test]
    async fn test_sort_by_field_then_key() {
        let h = harness();
        seed_people(&h.server, &[45, 10, 30, 10]).await;

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("sort", "age")
            .await
            .json();
        assert_eq!(
            result_keys(&body),
            vec![json!(2), json!(4), json!(3), json!(1)]
        );
    }

    #[tokio::test]
    async fn test_unset_values_sort_first() {
        let h = harness();
        seed_people(&h.server, &[45, 10]).await;
        create(&h.server, "Person", json!({"key": 3, "name": "ageless"})).await;

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("sort", "age")
            .await
            .json();
        assert_eq!(result_keys(&body), vec![json!(3), json!(2), json!(1)]);
    }

    #[tokio::test]
    async fn test_sort_by_unknown_field() {
        let h = harness();

        let response = h.server.get("/Person/").add_query_param("sort", "shoe").await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: Value = response.json();
        assert_eq!(body["code"], "BAD_FILTER_FIELD");
    }
}

mod paging_tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_and_offset() {
        let h = harness();
        seed_people(&h.server, &[1, 2, 3, 4, 5]).await;

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("limit", "2")
            .add_query_param("offset", "1")
            .await
            .json();
        assert_eq!(result_keys(&body), vec![json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn test_default_limit() {
        let h = harness();
        seed_people(&h.server, &[1, 2, 3, 4, 5, 6, 7]).await;

        let body: Value = h.server.get("/Person/").await.json();
        assert_eq!(result_keys(&body).len(), 5);
    }

    #[tokio::test]
    async fn test_malformed_paging_values_fall_back() {
        let h = harness();
        seed_people(&h.server, &[1, 2, 3, 4, 5, 6]).await;

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("limit", "lots")
            .add_query_param("offset", "-1")
            .await
            .json();
        assert_eq!(
            result_keys(&body),
            vec![json!(1), json!(2), json!(3), json!(4), json!(5)]
        );
    }

    #[tokio::test]
    async fn test_max_limit_caps_requests() {
        let settings = ServerConfig {
            max_limit: Some(3),
            ..settings()
        };
        let h = harness_with(ServerBuilder::new().with_authorizer(AllowAll), settings);
        seed_people(&h.server, &[1, 2, 3, 4, 5, 6]).await;

        let body: Value = h
            .server
            .get("/Person/")
            .add_query_param("limit", "100")
            .await
            .json();
        assert_eq!(result_keys(&body).len(), 3);
    }

    #[tokio::test]
    async fn test_delete_with_explicit_limit() {
        let h = harness();
        seed_people(&h.server, &[1, 2, 3, 4]).await;

        h.server
            .delete("/Person/")
            .add_query_param("limit", "2")
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let body: Value = h.server.get("/Person/").await.json();
        assert_eq!(result_keys(&body), vec![json!(3), json!(4)]);
    }
}
