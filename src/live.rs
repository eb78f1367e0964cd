use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, warn};

use crate::store::{Collection, Document, DocumentStore, FieldValue, StoreError, sort_newest_first};

pub type Snapshot = Result<Vec<Document>, StoreError>;

/// Handle to a standing query. Stays live until [`Subscription::close`];
/// dropping the handle leaves the query running for the life of the process.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn close(self) {
        self.task.abort();
    }
}

impl DocumentStore {
    /// Watches the documents of `collection` whose `field` equals `value`.
    ///
    /// `on_change` gets the whole matching set, newest first, once right away
    /// and again whenever a write to the collection changes it. Each call
    /// replaces the previous one; nothing is sent as a diff. Read failures are
    /// passed through as `Err` and the subscription keeps going.
    pub fn subscribe<F>(&self, collection: Collection, field: &str, value: FieldValue, mut on_change: F) -> Subscription
    where
        F: FnMut(Snapshot) + Send + 'static,
    {
        let store = self.clone();
        let field = field.to_owned();
        // taken before the first read so no write slips between the two
        let mut changes = self.changes();

        let task = tokio::spawn(async move {
            let mut last: Option<Vec<Document>> = None;
            loop {
                match store.query_by_field(collection, &field, &value).await {
                    Ok(mut docs) => {
                        sort_newest_first(&mut docs);
                        if last.as_ref() != Some(&docs) {
                            last = Some(docs.clone());
                            on_change(Ok(docs));
                        }
                    }
                    Err(e) => {
                        warn!("live query on {collection} where {field} failed: {e}");
                        last = None;
                        on_change(Err(e));
                    }
                }

                loop {
                    match changes.recv().await {
                        Ok(change) if change.collection == collection => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("live query on {collection} skipped {skipped} changes, refreshing");
                            break;
                        }
                        Err(RecvError::Closed) => return,
                    }
                }
            }
        });

        Subscription { task }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{sync::mpsc, time::timeout};

    use super::*;
    use crate::fields;

    async fn next(rx: &mut mpsc::UnboundedReceiver<Snapshot>) -> Vec<Document> {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("snapshot in time")
            .expect("subscription alive")
            .expect("query ok")
    }

    #[tokio::test]
    async fn delivers_initial_and_updated_snapshots() {
        let store = DocumentStore::in_memory().await.unwrap();
        store.create_document(Collection::Requests, fields! { "uid" => "u1", "serviceType" => "AC" }).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = store.subscribe(Collection::Requests, "uid", "u1".into(), move |s| {
            let _ = tx.send(s);
        });

        assert_eq!(next(&mut rx).await.len(), 1);

        let id = store.create_document(Collection::Requests, fields! { "uid" => "u1", "serviceType" => "Plumbing" }).await.unwrap();
        let docs = next(&mut rx).await;
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, id);
        assert!(docs[0].timestamp() >= docs[1].timestamp());

        sub.close();
    }

    #[tokio::test]
    async fn unrelated_writes_do_not_redeliver() {
        let store = DocumentStore::in_memory().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = store.subscribe(Collection::Requests, "uid", "u1".into(), move |s| {
            let _ = tx.send(s);
        });
        assert!(next(&mut rx).await.is_empty());

        store.create_document(Collection::Requests, fields! { "uid" => "u2" }).await.unwrap();
        store.create_document(Collection::RectorComplaints, fields! { "uid" => "u1" }).await.unwrap();
        let mine = store.create_document(Collection::Requests, fields! { "uid" => "u1" }).await.unwrap();

        let docs = next(&mut rx).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, mine);
    }

    #[tokio::test]
    async fn close_stops_delivery() {
        let store = DocumentStore::in_memory().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = store.subscribe(Collection::Requests, "uid", "u1".into(), move |s| {
            let _ = tx.send(s);
        });
        next(&mut rx).await;
        sub.close();

        store.create_document(Collection::Requests, fields! { "uid" => "u1" }).await.unwrap();
        // the aborted task drops its sender, closing the channel
        assert!(timeout(Duration::from_secs(5), rx.recv()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn errors_reach_the_callback() {
        let store = DocumentStore::in_memory().await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = store.subscribe(Collection::Requests, "bad\"field", "x".into(), move |s| {
            let _ = tx.send(s);
        });
        let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(first, Err(StoreError::InvalidField(_))));
    }
}
