use pace_tracker_data_management::{DataManagerError, DestinationHistory, HistoryManager};
use pace_tracker_lib::{Coordinate, Place};

fn place(name: &str, latitude: f64) -> Place {
    Place::new(name, Coordinate::new(latitude, 10.0))
}

#[tokio::test]
async fn history_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("history.json");

    let manager = HistoryManager::open(&path, 5).await.unwrap();
    assert!(manager.recent().await.is_empty());

    for (i, name) in ["Home", "Work", "Home", "Gym"].into_iter().enumerate() {
        manager.remember(place(name, i as f64)).await.unwrap();
    }
    assert!(manager.save(place("Cabin", 57.0)).await.unwrap());
    assert!(!manager.save(place("Cabin", 57.5)).await.unwrap());

    let reopened = HistoryManager::open(&path, 5).await.unwrap();
    let recent: Vec<String> = reopened.recent().await.into_iter().map(|p| p.name).collect();
    assert_eq!(recent, vec!["Gym", "Home", "Work"]);
    assert_eq!(reopened.recent().await[1].coordinate.latitude, 2.0);
    assert_eq!(reopened.saved().await, vec![place("Cabin", 57.5)]);

    assert!(!path.with_extension("json.tmp").exists());
}

#[tokio::test]
async fn removals_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");

    let manager = HistoryManager::open(&path, 5).await.unwrap();
    manager.remember(place("Home", 1.0)).await.unwrap();
    manager.save(place("Home", 1.0)).await.unwrap();

    assert!(manager.forget("Home").await.unwrap());
    assert!(!manager.forget("Home").await.unwrap());
    assert!(manager.unsave("Home").await.unwrap());

    let stored: DestinationHistory = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(stored, DestinationHistory::default());
}

#[tokio::test]
async fn clones_share_one_history() {
    let dir = tempfile::tempdir().unwrap();
    let manager = HistoryManager::open(dir.path().join("history.json"), 2).await.unwrap();
    let other = manager.clone();

    manager.remember(place("A", 1.0)).await.unwrap();
    other.remember(place("B", 2.0)).await.unwrap();
    manager.remember(place("C", 3.0)).await.unwrap();

    let recent: Vec<String> = other.recent().await.into_iter().map(|p| p.name).collect();
    assert_eq!(recent, vec!["C", "B"]);
}

#[tokio::test]
async fn corrupt_file_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, b"{ not json").unwrap();

    assert!(matches!(
        HistoryManager::open(&path, 5).await,
        Err(DataManagerError::Format(_))
    ));
}

#[tokio::test]
async fn history_answers_offline_lookups() {
    use pace_tracker_lib::GeocodingProvider;

    let dir = tempfile::tempdir().unwrap();
    let manager = HistoryManager::open(dir.path().join("history.json"), 5).await.unwrap();
    manager.save(place("Grandma's house", 55.0)).await.unwrap();
    manager.remember(place("House of Music", 56.0)).await.unwrap();
    manager.remember(place("house", 57.0)).await.unwrap();

    let names: Vec<String> = manager.search("House").await.unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["house", "Grandma's house", "House of Music"]);

    assert!(manager.search("castle").await.unwrap().is_empty());
    assert_eq!(manager.reverse(Coordinate::new(55.0, 10.0)).await.unwrap(), "Grandma's house");
    assert!(manager.reverse(Coordinate::new(0.0, 0.0)).await.is_err());
}
