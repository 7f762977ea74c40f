use crate::model::network::Vertex;
use crate::model::request::RoutingRequest;
use crate::model::state::PathState;
use std::sync::Arc;

/// a directed graph edge that a search can traverse. traversal is total over
/// states: an edge that cannot be taken from a given state returns `None`
/// rather than an error, pruning that branch.
///
/// traversal receivers are `Arc<Self>` so an edge can install itself as the
/// child state's back-edge. edges are shared immutable objects; any realtime
/// mutability lives behind the facility records their vertices reference.
pub trait TraversableEdge: Send + Sync {
    fn from_vertex(&self) -> &Arc<Vertex>;

    fn to_vertex(&self) -> &Arc<Vertex>;

    /// computes the child state for traversing this edge out of `state`, in
    /// the direction given by the state's request.
    fn traverse(self: Arc<Self>, state: &Arc<PathState>) -> Option<Arc<PathState>>;

    /// re-traversal hook for reverse optimization: time-dependent edges may
    /// use `reference_time_seconds` (the original traversal's departure-side
    /// time) to collapse waiting. everything else traverses normally.
    fn traverse_with_reference_time(
        self: Arc<Self>,
        state: &Arc<PathState>,
        _reference_time_seconds: i64,
    ) -> Option<Arc<PathState>> {
        self.traverse(state)
    }

    /// an admissible lower bound on the weight of traversing this edge under
    /// the given request; never exceeds any weight `traverse` can produce.
    fn weight_lower_bound(&self, _request: &RoutingRequest) -> f64 {
        0.0
    }

    /// edge length in meters.
    fn distance(&self) -> f64 {
        0.0
    }

    fn name(&self) -> String;

    /// `Some(true)` for a transit boarding edge, `Some(false)` for an
    /// alighting edge, `None` otherwise. reverse optimization uses this to
    /// find the first boarding of a path.
    fn board_alight_role(&self) -> Option<bool> {
        None
    }
}

/// a zero-length connector used to splice temporary origin/destination
/// vertices into the graph. the epsilon weight keeps searches from looping
/// through chains of free edges.
pub struct FreeEdge {
    from: Arc<Vertex>,
    to: Arc<Vertex>,
}

impl FreeEdge {
    pub fn new(from: Arc<Vertex>, to: Arc<Vertex>) -> FreeEdge {
        FreeEdge { from, to }
    }
}

impl TraversableEdge for FreeEdge {
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
        format!("free edge from {} to {}", self.from.name, self.to.name)
    }
}
