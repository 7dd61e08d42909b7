/// Tests for port reservation repository
#[cfg(test)]
#[allow(clippy::module_inception)]
mod tests {
    use super::super::*;
    use crate::test_support::memory_pool;

    async fn setup_test_db() -> PortReservationRepository {
        PortReservationRepository::new(memory_pool().await)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = setup_test_db().await;

        let inserted = repo.insert("demo", "blank", "web", 4321).await.unwrap();
        assert_eq!(inserted.port_number, 4321);

        let found = repo.find("demo", "blank", "web").await.unwrap().unwrap();
        assert_eq!(found.port_number, 4321);
        assert_eq!(found.slug, "demo");

        assert!(repo.find("demo", "blank", "db").await.unwrap().is_none());
        assert!(repo.is_reserved(4321).await.unwrap());
        assert!(!repo.is_reserved(4322).await.unwrap());
    }

    #[tokio::test]
    async fn test_port_number_is_globally_unique() {
        let repo = setup_test_db().await;
        repo.insert("demo", "blank", "web", 4321).await.unwrap();

        let err = repo.insert("other", "blank", "web", 4321).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert!(err.violates_column(PORT_NUMBER_COLUMN));
    }

    #[tokio::test]
    async fn test_identity_triple_is_unique() {
        let repo = setup_test_db().await;
        repo.insert("demo", "blank", "web", 4321).await.unwrap();

        let err = repo.insert("demo", "blank", "web", 4400).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert!(!err.violates_column(PORT_NUMBER_COLUMN));
    }

    #[tokio::test]
    async fn test_list_ordered_and_filtered() {
        let repo = setup_test_db().await;
        repo.insert("demo", "blank", "web", 5100).await.unwrap();
        repo.insert("demo", "blank", "db", 5050).await.unwrap();
        repo.insert("other", "nextjs", "web", 5000).await.unwrap();

        let all = repo.list(None).await.unwrap();
        let ports: Vec<u16> = all.iter().map(|r| r.port_number).collect();
        assert_eq!(ports, vec![5000, 5050, 5100]);

        let demo = repo.list(Some("demo")).await.unwrap();
        assert_eq!(demo.len(), 2);
        assert!(demo.iter().all(|r| r.slug == "demo"));
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_by_slug_leaves_others() {
        let repo = setup_test_db().await;
        repo.insert("demo", "blank", "web", 5100).await.unwrap();
        repo.insert("demo", "blank", "db", 5050).await.unwrap();
        repo.insert("other", "nextjs", "web", 5000).await.unwrap();

        assert_eq!(repo.delete_by_slug("demo").await.unwrap(), 2);
        assert_eq!(repo.delete_by_slug("demo").await.unwrap(), 0);

        let remaining = repo.list(None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].slug, "other");
    }
}
