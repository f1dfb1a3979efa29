//! Consul discovery tests against a mocked agent

#![cfg(feature = "consul-discovery")]

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use service_pool::config::service_discovery::ConsulConfig;
use service_pool::pool::{MutationFn, PoolOptions, ServicesPool};
use service_pool::service_discovery::{
    ConsulServiceDiscovery, DiscoveryError, DiscoveryOptions, ServiceDiscovery, TransportProtocol,
};

fn health_entries() -> serde_json::Value {
    json!([
        {
            "Node": { "Node": "node-1", "Address": "10.0.0.1" },
            "Service": {
                "ID": "billing-1",
                "Service": "billing",
                "Address": "10.0.0.5",
                "Port": 8080,
                "Tags": ["primary", "v2"]
            },
            "Checks": []
        },
        {
            "Node": { "Node": "node-2", "Address": "10.0.0.2" },
            "Service": {
                "ID": "billing-2",
                "Service": "billing",
                "Address": "",
                "Port": 8081,
                "Tags": null
            },
            "Checks": []
        }
    ])
}

async fn mock_health(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/v1/health/service/billing"))
        .and(query_param("passing", "true"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_discover_passing_instances() {
    let server = MockServer::start().await;
    mock_health(&server, ResponseTemplate::new(200).set_body_json(health_entries())).await;

    let discovery =
        ConsulServiceDiscovery::new(TransportProtocol::Tcp, None, &[server.uri().as_str()]).unwrap();
    let services = discovery.discover("billing").await.unwrap();

    assert_eq!(services.len(), 2);
    assert_eq!(services[0].id(), "billing-1");
    assert_eq!(services[0].address(), "10.0.0.5:8080");
    assert!(services[0].has_tag("primary"));
    assert!(services[0].has_tag("v2"));

    // Empty service address falls back to the node address
    assert_eq!(services[1].id(), "billing-2");
    assert_eq!(services[1].address(), "10.0.0.2:8081");
    assert!(services[1].tags().is_empty());
}

#[tokio::test]
async fn test_transport_scheme_and_path_suffix() {
    let server = MockServer::start().await;
    mock_health(&server, ResponseTemplate::new(200).set_body_json(health_entries())).await;

    let discovery = ConsulServiceDiscovery::new(
        TransportProtocol::Http,
        Some(DiscoveryOptions::with_path_suffix("/rpc")),
        &[server.uri().as_str()],
    )
    .unwrap();
    let services = discovery.discover("billing").await.unwrap();

    assert_eq!(services[0].address(), "http://10.0.0.5:8080/rpc");
    assert_eq!(services[1].address(), "http://10.0.0.2:8081/rpc");
}

#[tokio::test]
async fn test_empty_result_is_not_found() {
    let server = MockServer::start().await;
    mock_health(&server, ResponseTemplate::new(200).set_body_json(json!([]))).await;

    let discovery =
        ConsulServiceDiscovery::new(TransportProtocol::Tcp, None, &[server.uri().as_str()]).unwrap();
    let err = discovery.discover("billing").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err, DiscoveryError::not_found("billing"));
}

#[tokio::test]
async fn test_agent_error_is_backend_error() {
    let server = MockServer::start().await;
    mock_health(&server, ResponseTemplate::new(500)).await;

    let discovery =
        ConsulServiceDiscovery::new(TransportProtocol::Tcp, None, &[server.uri().as_str()]).unwrap();
    let err = discovery.discover("billing").await.unwrap_err();

    assert!(matches!(err, DiscoveryError::Backend { .. }));
    assert!(err.to_string().contains("discover billing service"));
}

#[tokio::test]
async fn test_token_and_datacenter_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health/service/billing"))
        .and(header("X-Consul-Token", "secret"))
        .and(query_param("dc", "eu-west"))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_entries()))
        .expect(1)
        .mount(&server)
        .await;

    let config = ConsulConfig {
        address: server.uri(),
        token: Some("secret".to_string()),
        datacenter: Some("eu-west".to_string()),
        ..Default::default()
    };
    let discovery = ConsulServiceDiscovery::with_config(TransportProtocol::Tcp, None, config).unwrap();

    assert_eq!(discovery.discover("billing").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_service_name_is_a_single_encoded_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/health/service/team%2Fbilling%20v2"))
        .and(query_param("passing", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_entries()))
        .expect(1)
        .mount(&server)
        .await;

    let discovery =
        ConsulServiceDiscovery::new(TransportProtocol::Tcp, None, &[server.uri().as_str()]).unwrap();

    assert_eq!(discovery.discover("team/billing v2").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_address_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/consul/v1/health/service/billing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_entries()))
        .expect(1)
        .mount(&server)
        .await;

    let address = format!("{}/consul/", server.uri());
    let discovery =
        ConsulServiceDiscovery::new(TransportProtocol::Tcp, None, &[address.as_str()]).unwrap();

    assert_eq!(discovery.discover("billing").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_pool_fills_from_consul() {
    let server = MockServer::start().await;
    mock_health(&server, ResponseTemplate::new(200).set_body_json(health_entries())).await;

    let discovery =
        ConsulServiceDiscovery::new(TransportProtocol::Tcp, None, &[server.uri().as_str()]).unwrap();
    let pool = ServicesPool::new(
        PoolOptions::new("billing", Arc::new(discovery))
            .discovery_interval(Duration::from_millis(50))
            .mutation(MutationFn::identity()),
    );

    pool.start(false).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(pool.count(), 2);

    pool.close().unwrap();
}
