//! Controller authority: which actors may mutate which field paths.
//!
//! The map is an ordered list of `(field prefix, actors)` entries plus an
//! exact-match index. Lookup resolves an exact key first, then scans
//! entries in insertion order and takes the first whose key prefixes the
//! queried field. Insertion order is part of the contract: it makes prefix
//! resolution and elimination output reproducible.

use std::collections::HashMap;

/// The wildcard actor token: any actor is authorised.
pub const ANY_ACTOR: &str = "*";

/// Operational metadata for a controller, used by explanation surfaces.
#[derive(Debug, Clone)]
pub struct ActorMetadata {
    pub name: String,
    pub description: String,
    pub team: String,
    pub contact: String,
    /// Conflict-resolution priority; lower wins.
    pub priority: u8,
}

#[derive(Debug, Clone)]
struct AuthorityEntry {
    prefix: String,
    actors: Vec<String>,
}

/// Mapping from field-path prefix to the actors authorised to mutate it.
#[derive(Debug, Clone)]
pub struct AuthorityMap {
    entries: Vec<AuthorityEntry>,
    /// Exact-key index into `entries`.
    exact: HashMap<String, usize>,
    metadata: HashMap<String, ActorMetadata>,
}

impl AuthorityMap {
    /// An empty map. Tests and non-Kubernetes deployments build their own
    /// authority model on top of this.
    pub fn empty() -> Self {
        AuthorityMap {
            entries: Vec::new(),
            exact: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// The default map, seeded with the well-known controllers of a
    /// Kubernetes-shaped cluster.
    pub fn new() -> Self {
        let mut map = AuthorityMap::empty();

        // Pod status
        map.insert("status.phase", &["kubelet", "pv-controller", "pvc-protection-controller"]);
        map.insert("status.conditions", &["kubelet", "node-controller"]);
        map.insert("status.containerStatuses", &["kubelet"]);
        map.insert("status.initContainerStatuses", &["kubelet"]);
        map.insert("status.hostIP", &["kubelet"]);
        map.insert("status.podIP", &["kubelet"]);
        map.insert("status.startTime", &["kubelet"]);

        // Scheduling
        map.insert("spec.nodeName", &["kube-scheduler"]);

        // Deployment / ReplicaSet
        map.insert(
            "spec.replicas",
            &["deployment-controller", "replicaset-controller", "statefulset-controller"],
        );
        map.insert(
            "status.replicas",
            &["replicaset-controller", "deployment-controller", "statefulset-controller"],
        );
        map.insert(
            "status.readyReplicas",
            &["replicaset-controller", "deployment-controller", "statefulset-controller"],
        );
        map.insert("status.availableReplicas", &["deployment-controller"]);
        map.insert("status.updatedReplicas", &["deployment-controller"]);

        // Service / Endpoints
        map.insert("status.loadBalancer", &["service-controller", "cloud-controller-manager"]);
        map.insert("status.endpoints", &["endpoint-controller", "endpointslice-controller"]);

        // Node
        map.insert("status.allocatable", &["kubelet"]);
        map.insert("status.capacity", &["kubelet"]);
        map.insert("status.addresses", &["kubelet", "cloud-controller-manager"]);

        // Lifecycle
        map.insert("metadata.deletionTimestamp", &["garbage-collector"]);
        map.insert("metadata.finalizers", &[ANY_ACTOR]);

        map.set_metadata(
            "kubelet",
            ActorMetadata {
                name: "kubelet".to_string(),
                description: "Node agent that manages pod lifecycle and reports status".to_string(),
                team: "platform-node".to_string(),
                contact: "platform-team@company.com".to_string(),
                priority: 1,
            },
        );
        map.set_metadata(
            "kube-scheduler",
            ActorMetadata {
                name: "kube-scheduler".to_string(),
                description: "Assigns pods to nodes based on resource requirements".to_string(),
                team: "platform".to_string(),
                contact: "platform-team@company.com".to_string(),
                priority: 2,
            },
        );
        map.set_metadata(
            "deployment-controller",
            ActorMetadata {
                name: "deployment-controller".to_string(),
                description: "Manages deployment rollouts and ReplicaSets".to_string(),
                team: "platform".to_string(),
                contact: "platform-team@company.com".to_string(),
                priority: 3,
            },
        );
        map.set_metadata(
            "replicaset-controller",
            ActorMetadata {
                name: "replicaset-controller".to_string(),
                description: "Ensures desired number of pod replicas are running".to_string(),
                team: "platform".to_string(),
                contact: "platform-team@company.com".to_string(),
                priority: 3,
            },
        );
        map.set_metadata(
            "node-controller",
            ActorMetadata {
                name: "node-controller".to_string(),
                description: "Monitors node health and manages node lifecycle".to_string(),
                team: "infrastructure".to_string(),
                contact: "infra-team@company.com".to_string(),
                priority: 1,
            },
        );
        map.set_metadata(
            "service-controller",
            ActorMetadata {
                name: "service-controller".to_string(),
                description: "Manages service endpoints and load balancers".to_string(),
                team: "platform".to_string(),
                contact: "platform-team@company.com".to_string(),
                priority: 3,
            },
        );
        map.set_metadata(
            "pv-controller",
            ActorMetadata {
                name: "pv-controller".to_string(),
                description: "Manages PersistentVolume binding and lifecycle".to_string(),
                team: "storage".to_string(),
                contact: "storage-team@company.com".to_string(),
                priority: 4,
            },
        );
        map.set_metadata(
            "garbage-collector",
            ActorMetadata {
                name: "garbage-collector".to_string(),
                description: "Cleans up orphaned resources".to_string(),
                team: "platform".to_string(),
                contact: "platform-team@company.com".to_string(),
                priority: 5,
            },
        );

        map
    }

    /// Add an authority entry. Re-inserting an existing prefix replaces
    /// its actor set in place, keeping the original scan position.
    pub fn insert(&mut self, prefix: &str, actors: &[&str]) {
        let actors: Vec<String> = actors.iter().map(|a| a.to_string()).collect();
        if let Some(&idx) = self.exact.get(prefix) {
            self.entries[idx].actors = actors;
            return;
        }
        self.exact.insert(prefix.to_string(), self.entries.len());
        self.entries.push(AuthorityEntry {
            prefix: prefix.to_string(),
            actors,
        });
    }

    pub fn set_metadata(&mut self, actor: &str, metadata: ActorMetadata) {
        self.metadata.insert(actor.to_string(), metadata);
    }

    /// The actors authorised to mutate `field`: exact key match first,
    /// then the first entry (in insertion order) whose prefix starts the
    /// field. Empty when nothing matches.
    pub fn authorized_controllers(&self, field: &str) -> &[String] {
        if let Some(&idx) = self.exact.get(field) {
            return &self.entries[idx].actors;
        }
        for entry in &self.entries {
            if field.starts_with(entry.prefix.as_str()) {
                return &entry.actors;
            }
        }
        &[]
    }

    /// Every known actor across all entries, wildcard excluded, in
    /// first-seen insertion order. Stable across calls.
    pub fn all_controllers(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            for actor in &entry.actors {
                if actor != ANY_ACTOR && !seen.contains(actor) {
                    seen.push(actor.clone());
                }
            }
        }
        seen
    }

    /// Whether `actor` may mutate `field` (directly or via wildcard).
    pub fn validate(&self, actor: &str, field: &str) -> bool {
        self.authorized_controllers(field)
            .iter()
            .any(|a| a == actor || a == ANY_ACTOR)
    }

    pub fn metadata(&self, actor: &str) -> Option<&ActorMetadata> {
        self.metadata.get(actor)
    }
}

impl Default for AuthorityMap {
    fn default() -> Self {
        AuthorityMap::new()
    }
}
