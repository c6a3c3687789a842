use rocket::Route;

mod authority;
mod election;
mod results;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(authority::routes());
    routes.extend(election::routes());
    routes.extend(voting::routes());
    routes.extend(results::routes());
    routes
}

/// Helpers shared by the route tests.
#[cfg(test)]
pub(crate) mod testing {
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };
    use serde::{de::DeserializeOwned, Serialize};

    use crate::model::common::IDENTITY_HEADER;
    use crate::Config;

    pub fn as_identity(identity: &str) -> Header<'static> {
        Header::new(IDENTITY_HEADER, identity.to_string())
    }

    /// Act as the bootstrap authority of the client's server.
    pub fn as_owner(client: &Client) -> Header<'static> {
        let config = client.rocket().state::<Config>().unwrap();
        as_identity(config.bootstrap_authority().as_str())
    }

    /// POST a JSON body as `identity`, returning the status and the raw body.
    pub async fn post_json(
        client: &Client,
        uri: String,
        identity: Header<'static>,
        body: &impl Serialize,
    ) -> (Status, Option<String>) {
        let response = client
            .post(uri)
            .header(ContentType::JSON)
            .header(identity)
            .body(serde_json::to_string(body).unwrap())
            .dispatch()
            .await;
        (response.status(), response.into_string().await)
    }

    pub async fn get_json<T: DeserializeOwned>(client: &Client, uri: String) -> T {
        let response = client.get(uri).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().await.unwrap();
        serde_json::from_str(&body).unwrap()
    }
}
