use actix_web::{http::StatusCode, test, App};
use planar_motion_sim::ui::configure_api;
use serde_json::{json, Value};

#[actix_web::test]
async fn health_reports_ok() {
    let app = test::init_service(App::new().configure(configure_api)).await;
    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn dynamics_defaults_to_reference_scenario() {
    let app = test::init_service(App::new().configure(configure_api)).await;
    let req = test::TestRequest::post().uri("/api/dynamics").set_json(json!({})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["series"]["t"].as_array().unwrap().len(), 500);
    assert_eq!(body["series"]["x2"].as_array().unwrap().len(), 500);
    let phi0 = body["series"]["phi"][0].as_f64().unwrap();
    assert!((phi0 - std::f64::consts::FRAC_PI_6).abs() < 1e-15);
    assert!(body["summary"]["initial"].as_f64().unwrap() > 0.0);
    assert!(body["stats"]["accepted"].as_u64().unwrap() > 0);
    assert!(body.get("trajectory_image").is_none());
}

#[actix_web::test]
async fn dynamics_rejects_zero_rod_length() {
    let app = test::init_service(App::new().configure(configure_api)).await;
    let req = test::TestRequest::post()
        .uri("/api/dynamics")
        .set_json(json!({ "rod_length_1": 0.0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "invalid_parameters");
}

#[actix_web::test]
async fn kinematics_returns_aligned_series_and_glyphs() {
    let app = test::init_service(App::new().configure(configure_api)).await;
    let req = test::TestRequest::post()
        .uri("/api/kinematics")
        .set_json(json!({ "samples": 101, "include_glyphs": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    for key in ["t", "x", "y", "vx", "vy", "ax", "ay"] {
        assert_eq!(body["series"][key].as_array().unwrap().len(), 101, "{key}");
    }
    assert_eq!(body["velocity"]["heading"].as_array().unwrap().len(), 101);
    assert_eq!(body["glyphs"]["velocity"].as_array().unwrap().len(), 101);
    assert!(body["expressions"]["vx"].as_str().unwrap().contains('t'));
}

#[actix_web::test]
async fn kinematics_error_kinds() {
    let app = test::init_service(App::new().configure(configure_api)).await;
    let cases = [
        (json!({ "radius": "abs(t)" }), "unsupported_motion_law"),
        (json!({ "angle": "omega * t" }), "invalid_expression"),
        (json!({ "samples": 0 }), "invalid_parameters"),
    ];
    for (payload, kind) in cases {
        let req = test::TestRequest::post().uri("/api/kinematics").set_json(payload).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["kind"], kind);
    }
}

#[actix_web::test]
async fn hostile_inputs_are_rejected_without_taking_the_server_down() {
    let app = test::init_service(App::new().configure(configure_api)).await;
    let nested = format!("{}t{}", "(".repeat(50_000), ")".repeat(50_000));
    let cases = [
        ("/api/kinematics", json!({ "radius": nested }), "invalid_expression"),
        ("/api/kinematics", json!({ "angle": "(".repeat(50_000) }), "invalid_expression"),
        ("/api/kinematics", json!({ "samples": 10_000_000_000u64 }), "invalid_parameters"),
        ("/api/dynamics", json!({ "samples": 10_000_000_000u64 }), "invalid_parameters"),
    ];
    for (uri, payload, kind) in cases {
        let req = test::TestRequest::post().uri(uri).set_json(payload).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["kind"], kind, "{uri}");
    }

    // Still serving afterwards.
    let req = test::TestRequest::get().uri("/api/health").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn dynamics_plots_include_angle_chart() {
    let app = test::init_service(App::new().configure(configure_api)).await;
    let req = test::TestRequest::post()
        .uri("/api/dynamics")
        .set_json(json!({ "t_end": 2.0, "samples": 50, "include_plot": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    // Rendering needs a system sans-serif font; without one the renderer fails with a 500.
    if resp.status() == StatusCode::INTERNAL_SERVER_ERROR {
        return;
    }
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    for key in ["trajectory_image", "energy_image", "angle_image"] {
        assert!(body[key].as_str().unwrap().starts_with("data:image/png;base64,"), "{key}");
    }
}
