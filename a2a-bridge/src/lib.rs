//! Bridge between MCP clients and A2A agents running in a Kubernetes cluster.
//!
//! Discovery reads cached AgentCard custom resources from the Kubernetes API
//! (no HTTP calls to the agents themselves); messaging resolves an agent's
//! public card and speaks the A2A JSON-RPC protocol, preferring the CRD's
//! authoritative in-cluster URL over whatever the card self-reports.

pub mod a2a;
pub mod discovery;
