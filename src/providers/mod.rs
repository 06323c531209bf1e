pub mod bitbucket;
pub mod facebook;
pub mod github;
pub mod gitlab;
pub mod google;
pub mod linkedin;
