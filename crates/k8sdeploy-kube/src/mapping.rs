//! Mapping - k8s-openapi のオブジェクトをドメインのサマリーへ変換
//!
//! すべて純粋関数なので、クラスタ無しでテストできます。
//! 欠けているフィールドは 0 / 空文字 / None として扱います。

use k8s_openapi::api::apps::v1 as apps;
use k8s_openapi::api::batch::v1 as batch;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::networking::v1 as networking;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8sdeploy_core::domain::{
    Container, Deployment, Ingress, Job, OwnerRef, Pod, ReplicaCounts, ReplicaSet, ResourceMeta,
    Service, StatefulSet,
};

fn meta(meta: &ObjectMeta) -> ResourceMeta {
    ResourceMeta {
        name: meta.name.clone().unwrap_or_default(),
        namespace: meta.namespace.clone().unwrap_or_default(),
        owners: meta
            .owner_references
            .iter()
            .flatten()
            .map(|o| OwnerRef {
                kind: o.kind.clone(),
                name: o.name.clone(),
            })
            .collect(),
    }
}

fn first_image(spec: Option<&corev1::PodSpec>) -> Option<String> {
    spec.and_then(|s| s.containers.first())
        .and_then(|c| c.image.clone())
}

fn template_image(template: Option<&corev1::PodTemplateSpec>) -> Option<String> {
    first_image(template.and_then(|t| t.spec.as_ref()))
}

pub fn namespace_name(ns: &corev1::Namespace) -> String {
    ns.metadata.name.clone().unwrap_or_default()
}

pub fn deployment(dep: &apps::Deployment) -> Deployment {
    let containers = dep
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .map(|pod| {
            pod.containers
                .iter()
                .map(|c| Container {
                    name: c.name.clone(),
                    image: c.image.clone().unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    let replicas = dep
        .status
        .as_ref()
        .map(|s| ReplicaCounts {
            total: s.replicas.unwrap_or(0),
            ready: s.ready_replicas.unwrap_or(0),
            available: s.available_replicas.unwrap_or(0),
            unavailable: s.unavailable_replicas.unwrap_or(0),
        })
        .unwrap_or_default();

    Deployment {
        meta: meta(&dep.metadata),
        containers,
        replicas,
    }
}

/// Desired replicas come from the spec; the status count is the fallback.
pub fn replica_set(rs: &apps::ReplicaSet) -> ReplicaSet {
    let status = rs.status.as_ref();
    let replicas = rs
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .or_else(|| status.map(|s| s.replicas))
        .unwrap_or(0);

    ReplicaSet {
        meta: meta(&rs.metadata),
        image: template_image(rs.spec.as_ref().and_then(|s| s.template.as_ref())),
        replicas,
        ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
    }
}

pub fn stateful_set(sts: &apps::StatefulSet) -> StatefulSet {
    let status = sts.status.as_ref();
    StatefulSet {
        meta: meta(&sts.metadata),
        image: template_image(sts.spec.as_ref().map(|s| &s.template)),
        ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
        current_replicas: status.and_then(|s| s.current_replicas).unwrap_or(0),
    }
}

pub fn job(job: &batch::Job) -> Job {
    let spec = job.spec.as_ref();
    let status = job.status.as_ref();
    Job {
        meta: meta(&job.metadata),
        image: template_image(spec.map(|s| &s.template)),
        completions: spec.and_then(|s| s.completions).unwrap_or(0),
        parallelism: spec.and_then(|s| s.parallelism).unwrap_or(0),
        active: status.and_then(|s| s.active).unwrap_or(0),
        succeeded: status.and_then(|s| s.succeeded).unwrap_or(0),
        failed: status.and_then(|s| s.failed).unwrap_or(0),
        started_at: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
    }
}

pub fn pod(pod: &corev1::Pod) -> Pod {
    let status = pod.status.as_ref();
    let restart_count = status
        .and_then(|s| s.container_statuses.as_ref())
        .and_then(|cs| cs.first())
        .map(|c| c.restart_count)
        .unwrap_or(0);

    Pod {
        meta: meta(&pod.metadata),
        phase: status.and_then(|s| s.phase.clone()).unwrap_or_default(),
        image: first_image(pod.spec.as_ref()),
        restart_count,
        started_at: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
    }
}

pub fn service(svc: &corev1::Service) -> Service {
    let spec = svc.spec.as_ref();
    Service {
        meta: meta(&svc.metadata),
        service_type: spec.and_then(|s| s.type_.clone()).unwrap_or_default(),
        cluster_ip: spec.and_then(|s| s.cluster_ip.clone()).unwrap_or_default(),
        ports: spec
            .and_then(|s| s.ports.as_ref())
            .map(|ports| ports.iter().map(|p| p.port).collect())
            .unwrap_or_default(),
        external_ips: spec
            .and_then(|s| s.external_ips.clone())
            .unwrap_or_default(),
    }
}

/// Load-balancer endpoints are IPs, or hostnames where no IP is assigned.
pub fn ingress(ing: &networking::Ingress) -> Ingress {
    let hosts = ing
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_ref())
        .map(|rules| rules.iter().filter_map(|r| r.host.clone()).collect())
        .unwrap_or_default();

    let load_balancer_ips = ing
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.ip.clone().or_else(|| e.hostname.clone()))
                .collect()
        })
        .unwrap_or_default();

    Ingress {
        meta: meta(&ing.metadata),
        hosts,
        load_balancer_ips,
    }
}

/// Copy the primary image of `desired` onto the native object's first container.
///
/// Returns false when the native object has no container to rewrite.
pub fn apply_primary_image(native: &mut apps::Deployment, desired: &Deployment) -> bool {
    let Some(image) = desired.primary_image() else {
        return false;
    };
    let container = native
        .spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
        .and_then(|pod| pod.containers.first_mut());
    match container {
        Some(c) => {
            c.image = Some(image.to_string());
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{OwnerReference, Time};

    fn object_meta(namespace: &str, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }
    }

    fn pod_spec(images: &[&str]) -> corev1::PodSpec {
        corev1::PodSpec {
            containers: images
                .iter()
                .enumerate()
                .map(|(i, image)| corev1::Container {
                    name: format!("c{i}"),
                    image: Some(image.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn template(images: &[&str]) -> corev1::PodTemplateSpec {
        corev1::PodTemplateSpec {
            spec: Some(pod_spec(images)),
            ..Default::default()
        }
    }

    fn native_deployment(images: &[&str]) -> apps::Deployment {
        apps::Deployment {
            metadata: object_meta("prod", "web"),
            spec: Some(apps::DeploymentSpec {
                template: template(images),
                ..Default::default()
            }),
            status: Some(apps::DeploymentStatus {
                replicas: Some(3),
                ready_replicas: Some(2),
                available_replicas: Some(2),
                unavailable_replicas: Some(1),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn deployment_keeps_containers_and_counts() {
        let got = deployment(&native_deployment(&["registry/web:v1", "registry/proxy:v9"]));

        assert_eq!(got.meta, ResourceMeta::new("prod", "web"));
        assert_eq!(got.primary_image(), Some("registry/web:v1"));
        assert_eq!(got.containers.len(), 2);
        assert_eq!(
            got.replicas,
            ReplicaCounts {
                total: 3,
                ready: 2,
                available: 2,
                unavailable: 1,
            }
        );
    }

    #[test]
    fn deployment_without_status_has_zero_counts() {
        let mut native = native_deployment(&["registry/web:v1"]);
        native.status = None;
        assert_eq!(deployment(&native).replicas, ReplicaCounts::default());
    }

    #[test]
    fn replica_set_carries_owner_and_desired_replicas() {
        let mut metadata = object_meta("prod", "web-7d9");
        metadata.owner_references = Some(vec![OwnerReference {
            kind: "Deployment".to_string(),
            name: "web".to_string(),
            ..Default::default()
        }]);
        let rs = apps::ReplicaSet {
            metadata,
            spec: Some(apps::ReplicaSetSpec {
                replicas: Some(0),
                template: Some(template(&["registry/web:v1"])),
                ..Default::default()
            }),
            status: Some(apps::ReplicaSetStatus {
                replicas: 2,
                ready_replicas: Some(1),
                ..Default::default()
            }),
        };

        let got = replica_set(&rs);
        assert!(got.meta.is_owned_by("web"));
        assert_eq!(got.replicas, 0);
        assert_eq!(got.ready_replicas, 1);
        assert_eq!(got.image.as_deref(), Some("registry/web:v1"));
    }

    #[test]
    fn job_start_time_and_counters() {
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let native = batch::Job {
            metadata: object_meta("batch", "nightly"),
            spec: Some(batch::JobSpec {
                template: template(&["registry/etl:3"]),
                completions: Some(5),
                parallelism: Some(2),
                ..Default::default()
            }),
            status: Some(batch::JobStatus {
                active: Some(1),
                succeeded: Some(3),
                failed: Some(1),
                start_time: Some(Time(started)),
                ..Default::default()
            }),
        };

        let got = job(&native);
        assert_eq!(got.completions, 5);
        assert_eq!(got.parallelism, 2);
        assert_eq!((got.active, got.succeeded, got.failed), (1, 3, 1));
        assert_eq!(got.started_at, Some(started));
        assert_eq!(got.image.as_deref(), Some("registry/etl:3"));
    }

    #[test]
    fn pod_uses_first_container_restarts() {
        let native = corev1::Pod {
            metadata: object_meta("prod", "web-7d9-abc"),
            spec: Some(pod_spec(&["registry/web:v1"])),
            status: Some(corev1::PodStatus {
                phase: Some("Running".to_string()),
                container_statuses: Some(vec![
                    corev1::ContainerStatus {
                        name: "c0".to_string(),
                        restart_count: 4,
                        ..Default::default()
                    },
                    corev1::ContainerStatus {
                        name: "c1".to_string(),
                        restart_count: 9,
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }),
        };

        let got = pod(&native);
        assert_eq!(got.phase, "Running");
        assert_eq!(got.restart_count, 4);
        assert_eq!(got.started_at, None);
    }

    #[test]
    fn service_ports_and_external_ips() {
        let native = corev1::Service {
            metadata: object_meta("prod", "web"),
            spec: Some(corev1::ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                cluster_ip: Some("10.0.0.7".to_string()),
                ports: Some(vec![
                    corev1::ServicePort {
                        port: 80,
                        ..Default::default()
                    },
                    corev1::ServicePort {
                        port: 443,
                        ..Default::default()
                    },
                ]),
                external_ips: Some(vec!["203.0.113.9".to_string()]),
                ..Default::default()
            }),
            status: None,
        };

        let got = service(&native);
        assert_eq!(got.service_type, "LoadBalancer");
        assert_eq!(got.cluster_ip, "10.0.0.7");
        assert_eq!(got.ports, vec![80, 443]);
        assert_eq!(got.external_ips, vec!["203.0.113.9".to_string()]);
    }

    #[test]
    fn ingress_hosts_and_load_balancer_endpoints() {
        let native = networking::Ingress {
            metadata: object_meta("prod", "web"),
            spec: Some(networking::IngressSpec {
                rules: Some(vec![
                    networking::IngressRule {
                        host: Some("web.example.com".to_string()),
                        ..Default::default()
                    },
                    networking::IngressRule::default(),
                ]),
                ..Default::default()
            }),
            status: Some(networking::IngressStatus {
                load_balancer: Some(networking::IngressLoadBalancerStatus {
                    ingress: Some(vec![
                        networking::IngressLoadBalancerIngress {
                            ip: Some("198.51.100.4".to_string()),
                            ..Default::default()
                        },
                        networking::IngressLoadBalancerIngress {
                            hostname: Some("lb.example.net".to_string()),
                            ..Default::default()
                        },
                    ]),
                }),
            }),
        };

        let got = ingress(&native);
        assert_eq!(got.hosts, vec!["web.example.com".to_string()]);
        assert_eq!(
            got.load_balancer_ips,
            vec!["198.51.100.4".to_string(), "lb.example.net".to_string()]
        );
    }

    #[test]
    fn apply_primary_image_rewrites_first_container_only() {
        let mut native = native_deployment(&["registry/web:v1", "registry/proxy:v9"]);
        let mut desired = deployment(&native);
        desired.set_primary_image("registry/web:v2");

        assert!(apply_primary_image(&mut native, &desired));

        let pod = native.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.containers[0].image.as_deref(), Some("registry/web:v2"));
        assert_eq!(pod.containers[1].image.as_deref(), Some("registry/proxy:v9"));
    }

    #[test]
    fn apply_primary_image_without_containers() {
        let mut native = native_deployment(&[]);
        let desired = deployment(&native_deployment(&["registry/web:v2"]));
        assert!(!apply_primary_image(&mut native, &desired));
    }
}
