pub mod movie;

pub use movie::{
    CastMember, MovieData, MovieRecord, MovieSummary, ProviderEntry, StreamingProviders,
    UpdateTarget,
};
