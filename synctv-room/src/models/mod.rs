pub mod id;
pub mod movie;
pub mod playback;
pub mod user;

pub use id::{generate_id, MovieId, RoomId, UserId};
pub use movie::{BaseMovie, Movie, MovieInfo};
pub use playback::{CurrentInfo, Status};
pub use user::{User, UserInfo, UserRecord};
