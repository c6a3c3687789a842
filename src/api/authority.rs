use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    authority::{AuthorityCheck, AuthorityGrant, AuthorityMember},
    common::Identity,
};
use crate::service::AuthorityRegistry;

pub fn routes() -> Vec<Route> {
    routes![is_authority, authorities, grant_authority]
}

#[get("/authorities/<identity>")]
async fn is_authority(
    identity: Identity,
    registry: &State<AuthorityRegistry>,
) -> Result<Json<AuthorityCheck>> {
    let is_authority = registry.is_authority(&identity).await?;
    Ok(Json(AuthorityCheck { is_authority }))
}

#[get("/authorities")]
async fn authorities(registry: &State<AuthorityRegistry>) -> Result<Json<Vec<AuthorityMember>>> {
    let members = registry.authorities().await?;
    Ok(Json(members.into_iter().map(AuthorityMember::from).collect()))
}

#[post("/authorities", data = "<grant>", format = "json")]
async fn grant_authority(
    caller: Identity,
    grant: Json<AuthorityGrant>,
    registry: &State<AuthorityRegistry>,
) -> Result<()> {
    registry.grant_authority(&caller, &grant.identity).await
}
