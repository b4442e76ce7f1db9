mod link;

pub use link::{CreateLinkRequest, LinkAnalytics, ListQuery, NewLink, ShortLink, VisitRecord};
