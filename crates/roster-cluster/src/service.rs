//! Person gRPC service — node side.
//!
//! Implements the `PersonService` interface over a [`PersonStore`].
//! Malformed and unknown ids never produce a gRPC error: single lookups
//! answer with an empty `Person`, bulk calls answer with whatever was
//! found, and mutations always acknowledge.

use roster_core::{Person, PersonDraft};
use roster_store::PersonStore;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use crate::proto;
use crate::proto::person_service_server::PersonService;

/// gRPC implementation of the person service.
pub struct PersonServer {
    node_id: String,
    store: PersonStore,
}

impl PersonServer {
    pub fn new(node_id: impl Into<String>, store: PersonStore) -> Self {
        Self {
            node_id: node_id.into(),
            store,
        }
    }

    /// Get the tonic service for mounting on a gRPC server.
    pub fn into_service(self) -> proto::person_service_server::PersonServiceServer<Self> {
        proto::person_service_server::PersonServiceServer::new(self)
    }

    fn to_proto(&self, person: Person) -> proto::Person {
        proto::Person {
            id: person.id.to_hex(),
            name: person.name,
            age: person.age,
            profession: person.profession,
            node: self.node_id.clone(),
        }
    }
}

fn to_draft(person: proto::Person) -> PersonDraft {
    PersonDraft {
        id: person.id,
        name: person.name,
        age: person.age,
        profession: person.profession,
    }
}

#[tonic::async_trait]
impl PersonService for PersonServer {
    async fn list_persons(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::MultiPerson>, Status> {
        let persons: Vec<proto::Person> = self
            .store
            .list()
            .await
            .into_iter()
            .map(|p| self.to_proto(p))
            .collect();

        debug!(count = persons.len(), "listed persons");
        Ok(Response::new(proto::MultiPerson { persons }))
    }

    async fn get_one_person(
        &self,
        request: Request<proto::Person>,
    ) -> Result<Response<proto::Person>, Status> {
        let req = request.into_inner();
        let person = match self.store.get(&req.id).await {
            Some(p) => self.to_proto(p),
            None => proto::Person::default(),
        };
        Ok(Response::new(person))
    }

    async fn get_multi_person(
        &self,
        request: Request<proto::MultiPerson>,
    ) -> Result<Response<proto::MultiPerson>, Status> {
        let ids: Vec<String> = request.into_inner().persons.into_iter().map(|p| p.id).collect();

        let persons: Vec<proto::Person> = self
            .store
            .get_many(ids.as_slice())
            .await
            .into_iter()
            .map(|p| self.to_proto(p))
            .collect();

        debug!(requested = ids.len(), found = persons.len(), "multi get");
        Ok(Response::new(proto::MultiPerson { persons }))
    }

    async fn upsert_one_person(
        &self,
        request: Request<proto::Person>,
    ) -> Result<Response<proto::Empty>, Status> {
        let req = request.into_inner();
        let id = req.id.clone();
        let outcome = self.store.upsert(to_draft(req)).await;
        info!(%id, ?outcome, "upsert");
        Ok(Response::new(proto::Empty {}))
    }

    async fn upsert_multi_person(
        &self,
        request: Request<proto::MultiPerson>,
    ) -> Result<Response<proto::Empty>, Status> {
        let drafts: Vec<PersonDraft> = request.into_inner().persons.into_iter().map(to_draft).collect();
        let outcome = self.store.upsert_many(drafts).await;
        info!(applied = outcome.applied, rejected = outcome.rejected, "multi upsert");
        Ok(Response::new(proto::Empty {}))
    }

    async fn drop_one_person(
        &self,
        request: Request<proto::Person>,
    ) -> Result<Response<proto::Empty>, Status> {
        let id = request.into_inner().id;
        let outcome = self.store.delete(&id).await;
        info!(%id, ?outcome, "drop");
        Ok(Response::new(proto::Empty {}))
    }

    async fn drop_multi_person(
        &self,
        request: Request<proto::MultiPerson>,
    ) -> Result<Response<proto::Empty>, Status> {
        let ids: Vec<String> = request.into_inner().persons.into_iter().map(|p| p.id).collect();
        let outcome = self.store.delete_many(ids.as_slice()).await;
        if outcome.nothing_matched() {
            info!(requested = ids.len(), "multi drop matched nothing");
        } else {
            info!(dropped = outcome.applied, "multi drop");
        }
        Ok(Response::new(proto::Empty {}))
    }

    async fn ping(
        &self,
        request: Request<proto::PingMessage>,
    ) -> Result<Response<proto::Empty>, Status> {
        debug!(from = %request.into_inner().id, "ping received");
        Ok(Response::new(proto::Empty {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANN: &str = "507f1f77bcf86cd799439011";
    const BOB: &str = "507f1f77bcf86cd799439012";

    fn person(id: &str, name: &str, age: i64, profession: &str) -> proto::Person {
        proto::Person {
            id: id.to_string(),
            name: name.to_string(),
            age,
            profession: profession.to_string(),
            node: String::new(),
        }
    }

    fn server() -> PersonServer {
        PersonServer::new("n1", PersonStore::new())
    }

    #[tokio::test]
    async fn upsert_then_get_stamps_node_id() {
        let svc = server();
        svc.upsert_one_person(Request::new(person(ANN, "Ann", 30, "eng")))
            .await
            .unwrap();

        let got = svc
            .get_one_person(Request::new(person(ANN, "", 0, "")))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(got, proto::Person { node: "n1".into(), ..person(ANN, "Ann", 30, "eng") });
    }

    #[tokio::test]
    async fn invalid_or_missing_id_returns_empty_person() {
        let svc = server();
        svc.upsert_one_person(Request::new(person("not-a-valid-id", "X", 1, "y")))
            .await
            .unwrap();

        for id in ["not-a-valid-id", BOB] {
            let got = svc
                .get_one_person(Request::new(person(id, "", 0, "")))
                .await
                .unwrap()
                .into_inner();
            assert_eq!(got, proto::Person::default());
        }

        let listed = svc.list_persons(Request::new(proto::Empty {})).await.unwrap();
        assert!(listed.into_inner().persons.is_empty());
    }

    #[tokio::test]
    async fn multi_calls_apply_partially() {
        let svc = server();
        svc.upsert_multi_person(Request::new(proto::MultiPerson {
            persons: vec![
                person(ANN, "Ann", 30, "eng"),
                person("bad", "Bad", 0, ""),
                person(BOB, "Bob", 40, "ops"),
            ],
        }))
        .await
        .unwrap();

        let got = svc
            .get_multi_person(Request::new(proto::MultiPerson {
                persons: vec![person(ANN, "", 0, ""), person("bad", "", 0, ""), person(BOB, "", 0, "")],
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(got.persons.len(), 2);
        assert!(got.persons.iter().all(|p| p.node == "n1"));

        svc.drop_multi_person(Request::new(proto::MultiPerson {
            persons: vec![person(ANN, "", 0, ""), person("bad", "", 0, "")],
        }))
        .await
        .unwrap();

        let listed = svc
            .list_persons(Request::new(proto::Empty {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(listed.persons.len(), 1);
        assert_eq!(listed.persons[0].id, BOB);
    }

    #[tokio::test]
    async fn drop_of_unknown_id_still_acknowledges() {
        let svc = server();
        assert!(svc.drop_one_person(Request::new(person(ANN, "", 0, ""))).await.is_ok());
        assert!(svc
            .drop_multi_person(Request::new(proto::MultiPerson { persons: vec![] }))
            .await
            .is_ok());
        assert!(svc
            .ping(Request::new(proto::PingMessage { id: "client".into() }))
            .await
            .is_ok());
    }
}
