//! Static pages.

use crate::extractors::MaybeAuthUser;
use crate::response::{PageResult, render};
use crate::views::{AboutAuthorTemplate, AboutTechTemplate, Chrome};

pub async fn author(MaybeAuthUser(viewer): MaybeAuthUser) -> PageResult {
    render(AboutAuthorTemplate {
        chrome: Chrome::new("About the author", viewer.as_ref()),
    })
}

pub async fn tech(MaybeAuthUser(viewer): MaybeAuthUser) -> PageResult {
    render(AboutTechTemplate {
        chrome: Chrome::new("Technologies", viewer.as_ref()),
    })
}
