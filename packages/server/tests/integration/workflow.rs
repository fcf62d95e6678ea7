use common::{ClusterStatus, EpisodeStatus, ImageStatus};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::common::{TestApp, routes};

/// Upload a one-episode archive and return `(episode_id, cluster ids)`.
async fn setup(app: &TestApp, folders: &[(&str, usize)]) -> (Uuid, Vec<Uuid>) {
    let episode_id = app.create_episode("Friends_S02E01.zip", folders).await;
    let clusters = app
        .clusters(episode_id)
        .await
        .into_iter()
        .map(|c| c.id)
        .collect();
    (episode_id, clusters)
}

async fn image_ids(app: &TestApp, cluster_id: Uuid) -> Vec<Uuid> {
    app.images(cluster_id).await.into_iter().map(|i| i.id).collect()
}

async fn mark(app: &TestApp, cluster_id: Uuid, ids: &[Uuid]) -> Value {
    let res = app
        .post(
            &routes::outliers(cluster_id),
            &json!({ "cluster_id": cluster_id, "outlier_image_ids": ids }),
        )
        .await;
    assert_eq!(res.status, 200, "mark outliers failed: {}", res.text);
    res.body
}

async fn statuses(app: &TestApp, cluster_id: Uuid) -> Vec<ImageStatus> {
    app.images(cluster_id)
        .await
        .into_iter()
        .map(|i| i.annotation_status)
        .collect()
}

mod review_page {
    use super::*;

    #[tokio::test]
    async fn pages_cover_every_reviewable_image_once() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 23)]).await;
        let cluster = clusters[0];
        let ids = image_ids(&app, cluster).await;
        mark(&app, cluster, &ids[..4]).await;

        let page_size = 5;
        let mut seen = Vec::new();
        for page in 1..=5 {
            let res = app.get(&routes::review_page(cluster, page, page_size)).await;
            assert_eq!(res.status, 200, "{}", res.text);
            assert_eq!(res.body["total_count"], 23);
            assert_eq!(res.body["has_prev"], page > 1);
            assert_eq!(res.body["has_next"], page < 5);
            for img in res.body["images"].as_array().unwrap() {
                seen.push(img["id"].as_str().unwrap().to_string());
            }
        }
        let expected: Vec<String> = ids.iter().map(|i| i.to_string()).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn annotated_images_leave_the_review_set() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 6)]).await;
        let cluster = clusters[0];
        let ids = image_ids(&app, cluster).await;
        mark(&app, cluster, &ids[..2]).await;

        let res = app
            .post(
                &routes::annotate_batch(cluster),
                &json!({"person_name": "Ross"}),
            )
            .await;
        assert_eq!(res.status, 200);

        let res = app.get(&routes::review_page(cluster, 1, 20)).await;
        assert_eq!(res.body["total_count"], 2);
        assert_eq!(res.body["has_next"], false);
        assert_eq!(res.body["has_prev"], false);
    }

    #[tokio::test]
    async fn page_size_is_clamped() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 3)]).await;

        let res = app.get(&routes::review_page(clusters[0], 0, 1000)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["page"], 1);
        assert_eq!(res.body["page_size"], 100);
        assert_eq!(res.body["images"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn huge_page_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 3)]).await;

        for page in [u64::MAX, u64::MAX / 20] {
            let res = app.get(&routes::review_page(clusters[0], page, 20)).await;
            assert_eq!(res.status, 400, "page {page}: {}", res.text);
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
        }

        let res = app.get(&routes::review_page(clusters[0], 1_000, 20)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["images"], json!([]));
        assert_eq!(res.body["has_next"], false);
    }

    #[tokio::test]
    async fn unknown_cluster_is_not_found() {
        let app = TestApp::spawn().await;
        let res = app.get(&routes::review_page(Uuid::now_v7(), 1, 10)).await;
        assert_eq!(res.status, 404);
    }
}

mod mark_outliers {
    use super::*;

    #[tokio::test]
    async fn marking_twice_is_idempotent() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 8)]).await;
        let cluster = clusters[0];
        let ids = image_ids(&app, cluster).await;

        let first = mark(&app, cluster, &ids[1..4]).await;
        let after_first = statuses(&app, cluster).await;
        let second = mark(&app, cluster, &ids[1..4]).await;

        assert_eq!(first["count"], 3);
        assert_eq!(second["count"], 3);
        assert_eq!(first["status"], "outliers_marked");
        assert_eq!(statuses(&app, cluster).await, after_first);

        let row = app.cluster_row(cluster).await;
        assert_eq!(row.outlier_count, 3);
        assert!(row.has_outliers);
        assert_eq!(row.annotation_status, ClusterStatus::InProgress);
    }

    #[tokio::test]
    async fn new_selection_replaces_the_old_one() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 6)]).await;
        let cluster = clusters[0];
        let ids = image_ids(&app, cluster).await;
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);

        mark(&app, cluster, &[a, b, c]).await;
        let res = mark(&app, cluster, &[a, b, d]).await;
        assert_eq!(res["count"], 3);

        let s = statuses(&app, cluster).await;
        assert_eq!(s[0], ImageStatus::Outlier);
        assert_eq!(s[1], ImageStatus::Outlier);
        assert_eq!(s[2], ImageStatus::Pending);
        assert_eq!(s[3], ImageStatus::Outlier);
        assert_eq!(app.cluster_row(cluster).await.outlier_count, 3);

        let res = app.get(&routes::outliers(cluster)).await;
        let listed: Vec<&str> = res.body.as_array().unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap())
            .collect();
        assert_eq!(listed, vec![a.to_string(), b.to_string(), d.to_string()]);
    }

    #[tokio::test]
    async fn empty_selection_clears_outliers() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 4)]).await;
        let cluster = clusters[0];
        let ids = image_ids(&app, cluster).await;

        mark(&app, cluster, &ids[..2]).await;
        let res = mark(&app, cluster, &[]).await;

        assert_eq!(res["count"], 0);
        assert!(
            statuses(&app, cluster)
                .await
                .iter()
                .all(|s| *s == ImageStatus::Pending)
        );
        assert!(!app.cluster_row(cluster).await.has_outliers);
    }

    #[tokio::test]
    async fn images_of_other_clusters_are_ignored() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 3), ("S02E01_cluster-02", 3)]).await;
        let (a, b) = (clusters[0], clusters[1]);
        let foreign = image_ids(&app, b).await[0];
        let own = image_ids(&app, a).await[0];

        let res = mark(&app, a, &[foreign, own]).await;

        assert_eq!(res["count"], 1);
        assert_eq!(statuses(&app, b).await[0], ImageStatus::Pending);
        assert_eq!(app.cluster_row(b).await.outlier_count, 0);
        assert_eq!(app.cluster_row(b).await.annotation_status, ClusterStatus::Pending);
    }

    #[tokio::test]
    async fn body_cluster_must_match_path() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 2), ("S02E01_cluster-02", 2)]).await;
        let ids = image_ids(&app, clusters[0]).await;

        let res = app
            .post(
                &routes::outliers(clusters[0]),
                &json!({ "cluster_id": clusters[1], "outlier_image_ids": [ids[0]] }),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(statuses(&app, clusters[0]).await[0], ImageStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_cluster_is_not_found() {
        let app = TestApp::spawn().await;
        let res = app
            .post(
                &routes::outliers(Uuid::now_v7()),
                &json!({ "outlier_image_ids": [] }),
            )
            .await;
        assert_eq!(res.status, 404);
    }
}

mod batch_annotate {
    use super::*;

    #[tokio::test]
    async fn leaves_outliers_untouched() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 10)]).await;
        let cluster = clusters[0];
        let ids = image_ids(&app, cluster).await;
        mark(&app, cluster, &ids[..3]).await;

        let res = app
            .post(
                &routes::annotate_batch(cluster),
                &json!({"person_name": " Rachel ", "is_custom_label": false}),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "cluster_annotated");
        assert_eq!(res.body["count"], 7);

        let images = app.images(cluster).await;
        for img in &images[..3] {
            assert_eq!(img.annotation_status, ImageStatus::Outlier);
            assert_eq!(img.current_label, None);
        }
        for img in &images[3..] {
            assert_eq!(img.annotation_status, ImageStatus::Annotated);
            assert_eq!(img.current_label.as_deref(), Some("Rachel"));
            assert!(img.annotated_at.is_some());
        }

        let row = app.cluster_row(cluster).await;
        assert_eq!(row.annotation_status, ClusterStatus::Completed);
        assert_eq!(row.person_name.as_deref(), Some("Rachel"));
        assert_eq!(row.is_single_person, Some(true));
        assert_eq!(row.outlier_count, 3);
    }

    #[tokio::test]
    async fn repeated_calls_count_the_cluster_once() {
        let app = TestApp::spawn().await;
        let (episode_id, clusters) =
            setup(&app, &[("S02E01_cluster-01", 2), ("S02E01_cluster-02", 2)]).await;

        for _ in 0..3 {
            let res = app
                .post(
                    &routes::annotate_batch(clusters[0]),
                    &json!({"person_name": "Chandler"}),
                )
                .await;
            assert_eq!(res.status, 200);
        }

        let episode = app.episode_row(episode_id).await;
        assert_eq!(episode.annotated_clusters, 1);
        assert_eq!(episode.status, EpisodeStatus::InProgress);

        app.post(
            &routes::annotate_batch(clusters[1]),
            &json!({"person_name": "Monica"}),
        )
        .await;
        let episode = app.episode_row(episode_id).await;
        assert_eq!(episode.annotated_clusters, 2);
        assert_eq!(episode.status, EpisodeStatus::Completed);
    }

    #[tokio::test]
    async fn concurrent_calls_on_different_clusters_both_count() {
        let app = TestApp::spawn().await;
        let folders: Vec<(String, usize)> = (1..=4)
            .map(|i| (format!("S02E01_cluster-{i:02}"), 3))
            .collect();
        let folders: Vec<(&str, usize)> = folders.iter().map(|(n, c)| (n.as_str(), *c)).collect();
        let (episode_id, clusters) = setup(&app, &folders).await;

        let body = json!({"person_name": "Phoebe"});
        let calls = clusters
            .iter()
            .flat_map(|c| [*c, *c])
            .map(|c| {
                let path = routes::annotate_batch(c);
                let body = body.clone();
                let app = &app;
                async move { app.post(&path, &body).await }
            });
        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(|r| r.status == 200));

        let episode = app.episode_row(episode_id).await;
        assert_eq!(episode.annotated_clusters, 4);
        assert_eq!(episode.status, EpisodeStatus::Completed);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 2)]).await;

        let res = app
            .post(
                &routes::annotate_batch(clusters[0]),
                &json!({"person_name": "   "}),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(
            app.cluster_row(clusters[0]).await.annotation_status,
            ClusterStatus::Pending
        );
    }

    #[tokio::test]
    async fn malformed_json_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 1)]).await;

        let res = app
            .post(&routes::annotate_batch(clusters[0]), &json!({"name": 3}))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod annotate_outliers {
    use super::*;

    #[tokio::test]
    async fn labels_each_outlier_individually() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 5)]).await;
        let cluster = clusters[0];
        let ids = image_ids(&app, cluster).await;
        mark(&app, cluster, &ids[..3]).await;

        let res = app
            .post(
                routes::ANNOTATE_OUTLIERS,
                &json!([
                    {"image_id": ids[0], "person_name": "Ross", "quality_attributes": ["blurry"]},
                    {"image_id": ids[1], "person_name": "Ross"},
                    {"image_id": ids[2], "person_name": "Janice", "is_custom_label": true},
                ]),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["count"], 3);
        assert_eq!(res.body["status"], "outliers_annotated");

        let images = app.images(cluster).await;
        assert_eq!(images[0].current_label.as_deref(), Some("Ross"));
        assert_eq!(images[0].quality_attributes, vec!["blurry".to_string()]);
        assert!(images[1].quality_attributes.is_empty());
        assert_eq!(images[2].current_label.as_deref(), Some("Janice"));
        assert!(images[2].is_custom_label);
        assert!(!images[1].is_custom_label);
        assert!(images[..3].iter().all(|i| i.annotation_status == ImageStatus::Annotated));
        assert!(images[3..].iter().all(|i| i.annotation_status == ImageStatus::Pending));

        let row = app.cluster_row(cluster).await;
        assert_eq!(row.outlier_count, 0);
        assert!(!row.has_outliers);
    }

    #[tokio::test]
    async fn repeat_call_is_rejected_without_changes() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 2)]).await;
        let ids = image_ids(&app, clusters[0]).await;
        mark(&app, clusters[0], &ids[..1]).await;

        let body = json!([{"image_id": ids[0], "person_name": "Emily"}]);
        assert_eq!(app.post(routes::ANNOTATE_OUTLIERS, &body).await.status, 200);
        let before = app.images(clusters[0]).await;

        let res = app.post(routes::ANNOTATE_OUTLIERS, &body).await;
        assert_eq!(res.status, 400);
        assert_eq!(app.images(clusters[0]).await, before);
    }

    #[tokio::test]
    async fn pending_images_are_rejected() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 3)]).await;
        let ids = image_ids(&app, clusters[0]).await;
        mark(&app, clusters[0], &ids[..1]).await;

        let res = app
            .post(
                routes::ANNOTATE_OUTLIERS,
                &json!([
                    {"image_id": ids[0], "person_name": "Ross"},
                    {"image_id": ids[1], "person_name": "Ross"},
                ]),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert_eq!(statuses(&app, clusters[0]).await[0], ImageStatus::Outlier);
    }

    #[tokio::test]
    async fn mixed_clusters_are_rejected() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 2), ("S02E01_cluster-02", 2)]).await;
        let a = image_ids(&app, clusters[0]).await;
        let b = image_ids(&app, clusters[1]).await;
        mark(&app, clusters[0], &a[..1]).await;
        mark(&app, clusters[1], &b[..1]).await;

        let res = app
            .post(
                routes::ANNOTATE_OUTLIERS,
                &json!([
                    {"image_id": a[0], "person_name": "Ross"},
                    {"image_id": b[0], "person_name": "Ross"},
                ]),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(statuses(&app, clusters[0]).await[0], ImageStatus::Outlier);
        assert_eq!(statuses(&app, clusters[1]).await[0], ImageStatus::Outlier);
    }

    #[tokio::test]
    async fn unknown_image_is_not_found() {
        let app = TestApp::spawn().await;
        let res = app
            .post(
                routes::ANNOTATE_OUTLIERS,
                &json!([{"image_id": Uuid::now_v7(), "person_name": "Ross"}]),
            )
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 2)]).await;
        let ids = image_ids(&app, clusters[0]).await;
        mark(&app, clusters[0], &ids[..1]).await;

        let res = app
            .post(
                routes::ANNOTATE_OUTLIERS,
                &json!([
                    {"image_id": ids[0], "person_name": "Ross"},
                    {"image_id": ids[0], "person_name": "Rachel"},
                ]),
            )
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn empty_list_is_a_no_op() {
        let app = TestApp::spawn().await;
        let res = app.post(routes::ANNOTATE_OUTLIERS, &json!([])).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["count"], 0);
    }
}

mod path_b {
    use super::*;

    #[tokio::test]
    async fn outliers_then_batch_completes_the_cluster() {
        let app = TestApp::spawn().await;
        let (episode_id, clusters) = setup(&app, &[("S02E01_cluster-01", 6)]).await;
        let cluster = clusters[0];
        let ids = image_ids(&app, cluster).await;

        mark(&app, cluster, &ids[..2]).await;
        app.post(
            routes::ANNOTATE_OUTLIERS,
            &json!([
                {"image_id": ids[0], "person_name": "Ross"},
                {"image_id": ids[1], "person_name": "Mike"},
            ]),
        )
        .await;
        let res = app
            .post(
                &routes::annotate_batch(cluster),
                &json!({"person_name": "Phoebe"}),
            )
            .await;
        assert_eq!(res.body["count"], 4);

        let labels: Vec<Option<String>> = app
            .images(cluster)
            .await
            .into_iter()
            .map(|i| i.current_label)
            .collect();
        assert_eq!(labels[0].as_deref(), Some("Ross"));
        assert_eq!(labels[1].as_deref(), Some("Mike"));
        assert!(labels[2..].iter().all(|l| l.as_deref() == Some("Phoebe")));

        let episode = app.episode_row(episode_id).await;
        assert_eq!(episode.annotated_clusters, 1);
        assert_eq!(episode.status, EpisodeStatus::Completed);
    }
}

mod legacy_annotate {
    use super::*;

    #[tokio::test]
    async fn single_person_delegates_to_batch() {
        let app = TestApp::spawn().await;
        let (episode_id, clusters) = setup(&app, &[("S02E01_cluster-01", 3)]).await;

        let res = app
            .post(
                &routes::annotate(clusters[0]),
                &json!({"is_single_person": true, "person_name": "Joey"}),
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["count"], 3);
        assert_eq!(app.episode_row(episode_id).await.annotated_clusters, 1);
    }

    #[tokio::test]
    async fn single_person_requires_a_name() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 3)]).await;

        let res = app
            .post(
                &routes::annotate(clusters[0]),
                &json!({"is_single_person": true}),
            )
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn multi_person_waits_for_split() {
        let app = TestApp::spawn().await;
        let (episode_id, clusters) = setup(&app, &[("S02E01_cluster-01", 3)]).await;

        let res = app
            .post(
                &routes::annotate(clusters[0]),
                &json!({"is_single_person": false}),
            )
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"], "awaiting_split");

        let row = app.cluster_row(clusters[0]).await;
        assert_eq!(row.is_single_person, Some(false));
        assert_eq!(row.annotation_status, ClusterStatus::InProgress);
        assert_eq!(app.episode_row(episode_id).await.annotated_clusters, 0);
    }
}

mod split {
    use super::*;

    #[tokio::test]
    async fn scene_tracks_group_images() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 3)]).await;

        let res = app.get(&routes::cluster_images(clusters[0])).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["images"].as_array().unwrap().len(), 3);
        let tracks = res.body["scene_tracks"].as_object().unwrap();
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks["scene_0_track_1"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn split_completes_the_cluster_once() {
        let app = TestApp::spawn().await;
        let (episode_id, clusters) =
            setup(&app, &[("S02E01_cluster-01", 4), ("S02E01_cluster-02", 1)]).await;
        let cluster = clusters[0];
        let paths: Vec<String> = app
            .images(cluster)
            .await
            .into_iter()
            .map(|i| i.file_path)
            .collect();

        let body = json!([
            {"scene_track_pattern": "scene_0_track_0", "person_name": "Ross", "image_paths": &paths[..2]},
            {"scene_track_pattern": "scene_0_track_2", "person_name": "Rachel", "image_paths": &paths[2..]},
        ]);
        let res = app.post(&routes::split(cluster), &body).await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body.as_array().unwrap().len(), 2);

        app.post(&routes::split(cluster), &body).await;

        let row = app.cluster_row(cluster).await;
        assert_eq!(row.annotation_status, ClusterStatus::Completed);
        assert_eq!(row.is_single_person, Some(false));
        assert_eq!(app.episode_row(episode_id).await.annotated_clusters, 1);
    }

    #[tokio::test]
    async fn foreign_paths_are_rejected() {
        let app = TestApp::spawn().await;
        let (_, clusters) = setup(&app, &[("S02E01_cluster-01", 2), ("S02E01_cluster-02", 2)]).await;
        let foreign = app.images(clusters[1]).await[0].file_path.clone();

        let res = app
            .post(
                &routes::split(clusters[0]),
                &json!([{"scene_track_pattern": "scene_1_track_1", "person_name": "Ross", "image_paths": [foreign]}]),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(
            app.cluster_row(clusters[0]).await.annotation_status,
            ClusterStatus::Pending
        );
    }
}
