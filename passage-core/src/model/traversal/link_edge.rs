use crate::model::network::Vertex;
use crate::model::state::PathState;
use crate::model::traversal::TraversableEdge;
use std::sync::Arc;

/// a zero-length connector between a street vertex and a facility vertex
/// (car park, bike park, rental station). mode-neutral; the facility's own
/// loop edge enforces mode guards. carries an epsilon weight so facility
/// detours are never free.
pub struct StreetEntityLink {
    from: Arc<Vertex>,
    to: Arc<Vertex>,
}

impl StreetEntityLink {
    pub fn new(from: Arc<Vertex>, to: Arc<Vertex>) -> StreetEntityLink {
        StreetEntityLink { from, to }
    }
}

impl TraversableEdge for StreetEntityLink {
    fn from_vertex(&self) -> &Arc<Vertex> {
        &self.from
    }

    fn to_vertex(&self) -> &Arc<Vertex> {
        &self.to
    }

    fn traverse(self: Arc<Self>, state: &Arc<PathState>) -> Option<Arc<PathState>> {
        let mode = state.non_transit_mode();
        let edge: Arc<dyn TraversableEdge> = self;
        let mut editor = state.edit(&edge);
        editor.set_back_mode(mode);
        editor.increment_weight(1.0);
        editor.make_state()
    }

    fn name(&self) -> String {
        format!("link from {} to {}", self.from.name, self.to.name)
    }
}
