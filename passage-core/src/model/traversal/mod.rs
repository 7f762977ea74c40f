mod bike_park_edge;
mod car_park_edge;
mod edge;
mod link_edge;
mod rental_edge;
mod street_edge;

pub use bike_park_edge::BikeParkEdge;
pub use car_park_edge::CarParkEdge;
pub use edge::{FreeEdge, TraversableEdge};
pub use link_edge::StreetEntityLink;
pub use rental_edge::BikeRentalEdge;
pub use street_edge::StreetEdge;
